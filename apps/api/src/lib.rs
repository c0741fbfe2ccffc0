//! # shopdesk API
//!
//! JSON HTTP API for the shopdesk service.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           API Services                                  │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Back office   │  │  Till          │  │  Storefront (public)       ││
//! │  │                │  │                │  │                            ││
//! │  │ • users        │  │ • sales        │  │ • /shop/{slug}/products    ││
//! │  │ • products     │  │ • customers    │  │ • carts                    ││
//! │  │ • suppliers    │  │ • debts        │  │ • checkout                 ││
//! │  │ • invoices     │  │                │  │                            ││
//! │  │ • reports      │  │                │  │ • /public/invoices/{token} ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │  shopdesk-db │  │  ServiceCfg  │  │    JWT Auth              ││  │
//! │  │  │              │  │              │  │                          ││  │
//! │  │  │ SQLite (WAL) │  │ TOML + env   │  │ Actor per request        ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`] for the file format. Environment variables:
//! - `SHOPDESK_BIND_ADDR`, `SHOPDESK_PORT` - listen address
//! - `SHOPDESK_DB_PATH` - SQLite file
//! - `SHOPDESK_JWT_SECRET` - Secret for JWT signing
//! - `SHOPDESK_CREDIT_TERM_DAYS` - Days until a credit sale falls due
//! - `SHOPDESK_DELIVERY_FEE_CENTS` - Storefront delivery fee
//! - `RUST_LOG` - log filter

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;

// Re-exports
pub use auth::{CurrentActor, JwtManager};
pub use config::{ConfigError, ServiceConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// Builds the complete router.
pub fn build_router(state: AppState) -> Router {
    routes::router(state)
}

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! In-process app: in-memory database, two shops, one token per user.

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use shopdesk_db::{Database, DbConfig, NewUser};
    use tower::ServiceExt;

    use crate::{build_router, AppState, JwtManager};

    pub struct TestApp {
        pub router: Router,
        pub state: AppState,
        pub site: String,
        pub shop: String,
        pub cashier: String,
        pub other_shop: String,
        pub shop_id: String,
        pub cashier_id: String,
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            full_name: format!("{} user", username),
            shop_name: None,
            shop_admin_id: None,
        }
    }

    /// Site admin `root`, shop admin `corner` with cashier `till1`, and shop
    /// admin `market`.
    pub async fn test_app() -> TestApp {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db.clone(), JwtManager::new("test-secret".to_string(), 3600));
        let users = db.users();

        let site = users.create_site_admin(new_user("root")).await.unwrap();
        let site_actor = users.actor_for(&site.id).await.unwrap().unwrap();
        let shop = users.create_shop_admin(&site_actor, new_user("corner")).await.unwrap();
        let shop_actor = users.actor_for(&shop.id).await.unwrap().unwrap();
        let other = users.create_shop_admin(&site_actor, new_user("market")).await.unwrap();
        let cashier = users.create_cashier(&shop_actor, new_user("till1")).await.unwrap();

        let token = |id: &str| state.jwt.generate_access_token(id).unwrap();

        TestApp {
            router: build_router(state.clone()),
            site: token(&site.id),
            shop: token(&shop.id),
            cashier: token(&cashier.id),
            other_shop: token(&other.id),
            shop_id: shop.id,
            cashier_id: cashier.id,
            state,
        }
    }

    /// Sends one request and returns the status and parsed JSON body
    /// (`Null` for an empty body).
    pub async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Creates a product through the API and returns its id.
    pub async fn create_product(app: &TestApp, sku: &str, quantity: i64, price_cents: i64) -> String {
        let (status, body) = send(
            &app.router,
            "POST",
            "/api/products",
            Some(&app.shop),
            Some(serde_json::json!({
                "sku": sku,
                "name": format!("Product {}", sku),
                "cost_price_cents": price_cents / 2,
                "selling_price_cents": price_cents,
                "initial_quantity": quantity,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}
