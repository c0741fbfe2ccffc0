//! # Supplier Repository
//!
//! Supplier directory per shop. Reads are tenant-scoped; writes need
//! `ManageSuppliers`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use shopdesk_core::validation::{normalize_optional, validate_email, validate_name};
use shopdesk_core::{Actor, Permission, Supplier, TenantScope};

use crate::error::{DbResult, OrNotFound};
use crate::scope::scoped_query;

const SUPPLIER_COLUMNS: &str = "SELECT id, tenant_id, name, contact_person, phone, email, address, \
     created_at, updated_at FROM suppliers";

/// Fields for creating or replacing a supplier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSupplier {
    /// Owning shop; site admins must set it on create.
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl NewSupplier {
    fn validate(&self) -> DbResult<()> {
        validate_name("name", &self.name)?;
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            validate_email("email", email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn create(&self, actor: &Actor, new: NewSupplier) -> DbResult<Supplier> {
        actor.require(Permission::ManageSuppliers)?;
        let tenant_id = actor.write_tenant(new.tenant_id.as_deref())?;
        new.validate()?;

        let now = Utc::now();
        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            name: new.name.trim().to_string(),
            contact_person: normalize_optional(new.contact_person),
            phone: normalize_optional(new.phone),
            email: normalize_optional(new.email),
            address: normalize_optional(new.address),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO suppliers (id, tenant_id, name, contact_person, phone, email, address, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&supplier.id)
        .bind(&supplier.tenant_id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .bind(supplier.created_at)
        .bind(supplier.updated_at)
        .execute(&self.pool)
        .await?;

        info!(supplier_id = %supplier.id, tenant_id = %supplier.tenant_id, "Supplier created");
        Ok(supplier)
    }

    /// Replaces a supplier's contact details. The owning shop never changes.
    pub async fn update(&self, actor: &Actor, id: &str, update: NewSupplier) -> DbResult<Supplier> {
        actor.require(Permission::ManageSuppliers)?;
        let current = self.get(&actor.scope()?, id).await?;
        update.validate()?;

        let updated = Supplier {
            name: update.name.trim().to_string(),
            contact_person: normalize_optional(update.contact_person),
            phone: normalize_optional(update.phone),
            email: normalize_optional(update.email),
            address: normalize_optional(update.address),
            updated_at: Utc::now(),
            ..current
        };

        sqlx::query(
            "UPDATE suppliers SET name = ?, contact_person = ?, phone = ?, email = ?, address = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&updated.name)
        .bind(&updated.contact_person)
        .bind(&updated.phone)
        .bind(&updated.email)
        .bind(&updated.address)
        .bind(updated.updated_at)
        .bind(&updated.id)
        .execute(&self.pool)
        .await?;

        debug!(supplier_id = %updated.id, "Supplier updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Actor, id: &str) -> DbResult<()> {
        actor.require(Permission::ManageSuppliers)?;
        let supplier = self.get(&actor.scope()?, id).await?;

        sqlx::query("DELETE FROM suppliers WHERE id = ?")
            .bind(&supplier.id)
            .execute(&self.pool)
            .await?;

        info!(supplier_id = %supplier.id, "Supplier deleted");
        Ok(())
    }

    pub async fn get(&self, scope: &TenantScope, id: &str) -> DbResult<Supplier> {
        let mut qb = scoped_query(SUPPLIER_COLUMNS, scope, "tenant_id");
        qb.push(" AND id = ");
        qb.push_bind(id.to_string());

        qb.build_query_as::<Supplier>()
            .fetch_optional(&self.pool)
            .await?
            .or_not_found("Supplier", id)
    }

    pub async fn list(&self, scope: &TenantScope) -> DbResult<Vec<Supplier>> {
        let mut qb = scoped_query(SUPPLIER_COLUMNS, scope, "tenant_id");
        qb.push(" ORDER BY name");

        let suppliers = qb.build_query_as::<Supplier>().fetch_all(&self.pool).await?;
        Ok(suppliers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::testing::fixture;
    use shopdesk_core::CoreError;

    fn supplier(name: &str) -> NewSupplier {
        NewSupplier {
            name: name.to_string(),
            email: Some("orders@acme.test".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_supplier_crud_scoped() {
        let f = fixture().await;
        let repo = f.db.suppliers();

        let created = repo.create(&f.shop, supplier("Acme Wholesale")).await.unwrap();
        assert_eq!(created.tenant_id, f.shop.user_id);

        let shop_scope = f.shop.scope().unwrap();
        let other_scope = f.other_shop.scope().unwrap();

        assert_eq!(repo.list(&shop_scope).await.unwrap().len(), 1);
        assert!(repo.list(&other_scope).await.unwrap().is_empty());
        assert!(matches!(
            repo.get(&other_scope, &created.id).await,
            Err(DbError::NotFound { .. })
        ));

        let updated = repo.update(&f.shop, &created.id, supplier("Acme Ltd")).await.unwrap();
        assert_eq!(updated.name, "Acme Ltd");

        // Another shop cannot delete it, even by id
        assert!(matches!(
            repo.delete(&f.other_shop, &created.id).await,
            Err(DbError::NotFound { .. })
        ));
        repo.delete(&f.shop, &created.id).await.unwrap();
        assert!(repo.list(&shop_scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_supplier_writes_need_admin() {
        let f = fixture().await;
        let err = f.db.suppliers().create(&f.cashier, supplier("Acme")).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::PermissionDenied { .. })));

        // Cashiers can still read their shop's suppliers
        f.db.suppliers().create(&f.shop, supplier("Acme")).await.unwrap();
        let list = f.db.suppliers().list(&f.cashier.scope().unwrap()).await.unwrap();
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn test_site_admin_sees_all_suppliers() {
        let f = fixture().await;
        let repo = f.db.suppliers();
        repo.create(&f.shop, supplier("A")).await.unwrap();
        repo.create(&f.other_shop, supplier("B")).await.unwrap();

        assert_eq!(repo.list(&TenantScope::All).await.unwrap().len(), 2);

        let mut bad = supplier("C");
        bad.email = Some("not-an-email".to_string());
        assert!(repo.create(&f.shop, bad).await.is_err());
    }
}
