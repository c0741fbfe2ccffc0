//! # User Repository
//!
//! Accounts, role assignment and [`Actor`] resolution.
//!
//! ```text
//! site admin ──creates──► shop admin ──creates──► cashier
//!                          (tenant)               shop_admin_id = tenant
//! ```
//!
//! Users are scoped by `COALESCE(shop_admin_id, id)`: a shop admin row maps
//! to itself and a cashier row maps to its shop admin, so a shop admin's
//! listing is themselves plus their cashiers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use shopdesk_core::validation::{normalize_optional, validate_name, validate_username};
use shopdesk_core::{Actor, CoreError, Permission, Role, User};

use crate::error::{on_duplicate, DbError, DbResult, OrNotFound};
use crate::scope::scoped_query;

const USER_COLUMNS: &str = "SELECT id, username, full_name, role, shop_admin_id, shop_name, \
     is_active, created_at, updated_at FROM users";

/// Column that maps a user row to the tenant it belongs to.
const USER_TENANT: &str = "COALESCE(shop_admin_id, id)";

/// Fields for a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    /// Trading name (shop admins).
    #[serde(default)]
    pub shop_name: Option<String>,
    /// Shop admin a new cashier works for; site admins must set it.
    #[serde(default)]
    pub shop_admin_id: Option<String>,
}

/// Repository for user accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Loads an active user by id.
    pub async fn find_active(&self, id: &str) -> DbResult<Option<User>> {
        let mut qb = sqlx::QueryBuilder::new(USER_COLUMNS);
        qb.push(" WHERE is_active = 1 AND id = ");
        qb.push_bind(id.to_string());

        let user = qb.build_query_as::<User>().fetch_optional(&self.pool).await?;
        Ok(user)
    }

    /// Resolves the acting user for a request.
    ///
    /// Reads the current role and shop assignment, so a cashier moved or
    /// deactivated after a token was issued is seen as such immediately.
    /// Returns `None` for unknown or inactive users.
    pub async fn actor_for(&self, id: &str) -> DbResult<Option<Actor>> {
        let actor = self
            .find_active(id)
            .await?
            .map(|u| Actor::new(u.id, u.username, u.role, u.shop_admin_id));
        Ok(actor)
    }

    /// Creates the first site administrator.
    ///
    /// Only callable from trusted code (the seed binary and tests); the HTTP
    /// surface never exposes it.
    pub async fn create_site_admin(&self, new: NewUser) -> DbResult<User> {
        self.insert(new, Role::SiteAdmin, None).await
    }

    /// Creates a shop administrator, i.e. a new tenant.
    ///
    /// ## Errors
    /// - `PermissionDenied` unless the actor is a site admin
    pub async fn create_shop_admin(&self, actor: &Actor, new: NewUser) -> DbResult<User> {
        actor.require(Permission::ManageShopAdmins)?;
        let user = self.insert(new, Role::ShopAdmin, None).await?;
        info!(user_id = %user.id, username = %user.username, created_by = %actor.user_id, "Shop admin created");
        Ok(user)
    }

    /// Creates a cashier for the actor's shop, or for the named shop admin
    /// when a site admin is acting.
    ///
    /// ## Errors
    /// - `PermissionDenied` for cashiers, or a shop admin naming another shop
    /// - `TenantRequired` when a site admin names no shop admin
    /// - `NotFound` when the named user is not an active shop admin
    pub async fn create_cashier(&self, actor: &Actor, new: NewUser) -> DbResult<User> {
        actor.require(Permission::ManageCashiers)?;
        let tenant_id = actor.write_tenant(new.shop_admin_id.as_deref())?;

        let role: Option<Role> =
            sqlx::query_scalar("SELECT role FROM users WHERE id = ? AND is_active = 1")
                .bind(&tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        if role != Some(Role::ShopAdmin) {
            return Err(DbError::not_found("Shop admin", tenant_id));
        }

        let user = self.insert(new, Role::Cashier, Some(tenant_id)).await?;
        info!(user_id = %user.id, tenant_id = ?user.shop_admin_id, "Cashier created");
        Ok(user)
    }

    async fn insert(&self, new: NewUser, role: Role, shop_admin_id: Option<String>) -> DbResult<User> {
        let username = new.username.trim().to_string();
        validate_username(&username)?;
        validate_name("full_name", &new.full_name)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username,
            full_name: new.full_name.trim().to_string(),
            role,
            shop_admin_id,
            shop_name: normalize_optional(new.shop_name).filter(|_| role == Role::ShopAdmin),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(username = %user.username, role = %user.role, "Inserting user");

        sqlx::query(
            "INSERT INTO users (id, username, full_name, role, shop_admin_id, shop_name, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(&user.shop_admin_id)
        .bind(&user.shop_name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("username", &user.username))?;

        Ok(user)
    }

    /// Gets a user visible to the actor.
    pub async fn get(&self, actor: &Actor, id: &str) -> DbResult<User> {
        let scope = actor.scope()?;
        let mut qb = scoped_query(USER_COLUMNS, &scope, USER_TENANT);
        qb.push(" AND id = ");
        qb.push_bind(id.to_string());

        qb.build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?
            .or_not_found("User", id)
    }

    /// Lists users the actor manages: everyone for a site admin, the shop
    /// admin and their cashiers otherwise.
    pub async fn list(&self, actor: &Actor) -> DbResult<Vec<User>> {
        actor.require(Permission::ManageCashiers)?;
        let scope = actor.scope()?;

        let mut qb = scoped_query(USER_COLUMNS, &scope, USER_TENANT);
        qb.push(" ORDER BY role, username");

        let users = qb.build_query_as::<User>().fetch_all(&self.pool).await?;
        debug!(count = users.len(), "Listed users");
        Ok(users)
    }

    /// Deactivates a user.
    ///
    /// ## Errors
    /// - `PermissionDenied` when deactivating oneself, or an administrator
    ///   without being a site admin
    /// - `NotFound` outside the actor's scope
    pub async fn deactivate(&self, actor: &Actor, id: &str) -> DbResult<User> {
        actor.require(Permission::ManageCashiers)?;
        let target = self.get(actor, id).await?;

        if target.id == actor.user_id {
            return Err(CoreError::denied("deactivate your own account").into());
        }
        if target.role != Role::Cashier {
            actor.require(Permission::ManageShopAdmins)?;
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(&target.id)
            .execute(&self.pool)
            .await?;

        info!(user_id = %target.id, by = %actor.user_id, "User deactivated");

        Ok(User {
            is_active: false,
            updated_at: now,
            ..target
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            full_name: "Someone".to_string(),
            shop_name: None,
            shop_admin_id: None,
        }
    }

    #[tokio::test]
    async fn test_actor_resolution() {
        let f = fixture().await;
        assert_eq!(f.shop.role, Role::ShopAdmin);
        assert_eq!(f.shop.tenant_id.as_deref(), Some(f.shop.user_id.as_str()));
        assert_eq!(f.cashier.tenant_id, f.shop.tenant_id);
        assert!(f.site.tenant_id.is_none());

        assert!(f.db.users().actor_for("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_only_site_admin_creates_shop_admins() {
        let f = fixture().await;
        let err = f.db.users().create_shop_admin(&f.shop, new_user("rival")).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let f = fixture().await;
        let err = f.db.users().create_cashier(&f.shop, new_user("till1")).await.unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "username");
                assert_eq!(value, "till1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_site_admin_creates_cashier_for_named_shop() {
        let f = fixture().await;
        let users = f.db.users();

        let mut req = new_user("till2");
        req.shop_admin_id = Some(f.other_shop.user_id.clone());
        let cashier = users.create_cashier(&f.site, req).await.unwrap();
        assert_eq!(cashier.shop_admin_id.as_deref(), Some(f.other_shop.user_id.as_str()));

        // Must name a shop
        let err = users.create_cashier(&f.site, new_user("till3")).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::TenantRequired { .. })));

        // Named user must be a shop admin
        let mut req = new_user("till4");
        req.shop_admin_id = Some(f.cashier.user_id.clone());
        let err = users.create_cashier(&f.site, req).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_shop_admin_cannot_create_cashier_for_other_shop() {
        let f = fixture().await;
        let mut req = new_user("till2");
        req.shop_admin_id = Some(f.other_shop.user_id.clone());
        let err = f.db.users().create_cashier(&f.shop, req).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_list_is_scoped() {
        let f = fixture().await;
        let users = f.db.users();

        let mine = users.list(&f.shop).await.unwrap();
        let names: Vec<_> = mine.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"corner"));
        assert!(names.contains(&"till1"));

        assert_eq!(users.list(&f.site).await.unwrap().len(), 4);
        assert!(users.list(&f.cashier).await.is_err());

        let err = users.get(&f.other_shop, &f.cashier.user_id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_deactivate() {
        let f = fixture().await;
        let users = f.db.users();

        let err = users.deactivate(&f.shop, &f.shop.user_id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::PermissionDenied { .. })));

        let err = users.deactivate(&f.other_shop, &f.cashier.user_id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let user = users.deactivate(&f.shop, &f.cashier.user_id).await.unwrap();
        assert!(!user.is_active);
        assert!(users.actor_for(&f.cashier.user_id).await.unwrap().is_none());

        users.deactivate(&f.site, &f.other_shop.user_id).await.unwrap();
        assert!(users.actor_for(&f.other_shop.user_id).await.unwrap().is_none());
    }
}
