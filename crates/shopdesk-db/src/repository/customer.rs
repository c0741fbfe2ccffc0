//! # Customer Repository
//!
//! Customers of a shop and their credit position.
//!
//! ```text
//! available_credit = credit_limit - Σ (amount - amount_paid) over unsettled debts
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use shopdesk_core::validation::{normalize_optional, validate_amount_cents, validate_email, validate_name, validate_search_query};
use shopdesk_core::{Actor, Customer, CustomerCredit, Money, TenantScope};

use crate::error::{DbResult, OrNotFound};
use crate::scope::scoped_query;

const CUSTOMER_COLUMNS: &str = "SELECT id, tenant_id, name, phone, email, address, credit_limit_cents, \
     is_active, created_at FROM customers";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    /// Owning shop; site admins must set it.
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub credit_limit_cents: i64,
}

/// Partial customer update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit_cents: Option<i64>,
    pub is_active: Option<bool>,
}

fn check_email(email: Option<&str>) -> DbResult<()> {
    if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
        validate_email("email", email)?;
    }
    Ok(())
}

/// Outstanding balance across a customer's unsettled debts.
pub(crate) async fn credit_for(
    conn: &mut SqliteConnection,
    customer_id: &str,
    credit_limit: Money,
) -> DbResult<CustomerCredit> {
    let total_debt: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents - amount_paid_cents), 0) FROM debts \
         WHERE customer_id = ? AND amount_paid_cents < amount_cents",
    )
    .bind(customer_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(CustomerCredit::new(credit_limit, Money::from_cents(total_debt)))
}

/// Loads a customer inside `scope`.
pub(crate) async fn find_customer(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: &str,
) -> DbResult<Option<Customer>> {
    let mut qb = scoped_query(CUSTOMER_COLUMNS, scope, "tenant_id");
    qb.push(" AND id = ");
    qb.push_bind(id.to_string());

    let customer = qb.build_query_as::<Customer>().fetch_optional(&mut *conn).await?;
    Ok(customer)
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates a customer. Any role may register customers at the till.
    pub async fn create(&self, actor: &Actor, new: NewCustomer) -> DbResult<Customer> {
        let tenant_id = actor.write_tenant(new.tenant_id.as_deref())?;
        validate_name("name", &new.name)?;
        validate_amount_cents("credit_limit", new.credit_limit_cents)?;
        check_email(new.email.as_deref())?;

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            name: new.name.trim().to_string(),
            phone: normalize_optional(new.phone),
            email: normalize_optional(new.email),
            address: normalize_optional(new.address),
            credit_limit_cents: new.credit_limit_cents,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO customers (id, tenant_id, name, phone, email, address, credit_limit_cents, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&customer.id)
        .bind(&customer.tenant_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.credit_limit_cents)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        info!(customer_id = %customer.id, tenant_id = %customer.tenant_id, "Customer created");
        Ok(customer)
    }

    pub async fn update(&self, actor: &Actor, id: &str, update: CustomerUpdate) -> DbResult<Customer> {
        let current = self.get(&actor.scope()?, id).await?;

        if let Some(name) = &update.name {
            validate_name("name", name)?;
        }
        if let Some(limit) = update.credit_limit_cents {
            validate_amount_cents("credit_limit", limit)?;
        }
        check_email(update.email.as_deref())?;

        let updated = Customer {
            name: update.name.map(|n| n.trim().to_string()).unwrap_or(current.name.clone()),
            phone: update.phone.map(Some).map(normalize_optional).unwrap_or(current.phone.clone()),
            email: update.email.map(Some).map(normalize_optional).unwrap_or(current.email.clone()),
            address: update.address.map(Some).map(normalize_optional).unwrap_or(current.address.clone()),
            credit_limit_cents: update.credit_limit_cents.unwrap_or(current.credit_limit_cents),
            is_active: update.is_active.unwrap_or(current.is_active),
            ..current
        };

        sqlx::query(
            "UPDATE customers SET name = ?, phone = ?, email = ?, address = ?, credit_limit_cents = ?, is_active = ? \
             WHERE id = ?",
        )
        .bind(&updated.name)
        .bind(&updated.phone)
        .bind(&updated.email)
        .bind(&updated.address)
        .bind(updated.credit_limit_cents)
        .bind(updated.is_active)
        .bind(&updated.id)
        .execute(&self.pool)
        .await?;

        debug!(customer_id = %updated.id, "Customer updated");
        Ok(updated)
    }

    pub async fn get(&self, scope: &TenantScope, id: &str) -> DbResult<Customer> {
        let mut conn = self.pool.acquire().await?;
        find_customer(&mut conn, scope, id).await?.or_not_found("Customer", id)
    }

    pub async fn list(&self, scope: &TenantScope, search: Option<&str>) -> DbResult<Vec<Customer>> {
        let mut qb = scoped_query(CUSTOMER_COLUMNS, scope, "tenant_id");

        if let Some(query) = search {
            let query = validate_search_query(query)?;
            if !query.is_empty() {
                let pattern = format!("%{}%", query);
                qb.push(" AND (name LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR phone LIKE ");
                qb.push_bind(pattern);
                qb.push(")");
            }
        }
        qb.push(" ORDER BY name");

        let customers = qb.build_query_as::<Customer>().fetch_all(&self.pool).await?;
        Ok(customers)
    }

    /// Credit position of a customer.
    pub async fn credit(&self, scope: &TenantScope, id: &str) -> DbResult<CustomerCredit> {
        let mut conn = self.pool.acquire().await?;
        let customer = find_customer(&mut conn, scope, id).await?.or_not_found("Customer", id)?;
        credit_for(&mut conn, &customer.id, customer.credit_limit()).await
    }
}
