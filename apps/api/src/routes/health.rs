//! Health check endpoint for monitoring and load balancers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "serving" or "not_serving"
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
    pub server_time: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;
    let (status, code) = if database {
        ("serving", StatusCode::OK)
    } else {
        ("not_serving", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
            server_time: Utc::now().to_rfc3339(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use crate::testing::{send, test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let app = test_app().await;
        let (status, body) = send(&app.router, "GET", "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "serving");
        assert_eq!(body["database"], true);
    }
}
