//! # Routes
//!
//! ```text
//! /health                       no auth
//! /public/invoices/{token}      no auth, share token
//! /shop/{slug}/...              no auth, active storefronts only
//! /api/...                      Bearer token → CurrentActor
//! ```
//!
//! Authentication is an extractor rather than a layer: a handler that takes
//! [`CurrentActor`](crate::auth::CurrentActor) is protected, one that does
//! not is public.

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tracing::{info, warn};

use crate::state::AppState;

pub mod customers;
pub mod debts;
pub mod health;
pub mod inventory;
pub mod invoices;
pub mod reports;
pub mod sales;
pub mod shop;
pub mod storefront;
pub mod users;

/// Every route, with request logging.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(users::routes())
        .merge(inventory::routes())
        .merge(customers::routes())
        .merge(sales::routes())
        .merge(debts::routes())
        .merge(invoices::routes())
        .merge(reports::routes())
        .merge(storefront::routes())
        .merge(shop::routes())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        warn!(%method, %path, status, elapsed_ms, "Request failed");
    } else {
        info!(%method, %path, status, elapsed_ms, "Request handled");
    }
    response
}
