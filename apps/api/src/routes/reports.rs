//! Report routes.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use shopdesk_core::report::{SalesSummary, ShopDashboard};

use crate::auth::CurrentActor;
use crate::error::{ApiQuery, ApiResult};
use crate::state::AppState;

/// Window used when `from` is omitted.
const DEFAULT_REPORT_DAYS: i64 = 30;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports/sales", get(sales_report))
        .route("/api/reports/dashboard", get(dashboard))
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RangeQuery {
    /// `[from, to]`, defaulting to the last 30 days ending today.
    fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let to = self.to.unwrap_or(today);
        let from = self.from.unwrap_or(to - Duration::days(DEFAULT_REPORT_DAYS - 1));
        (from, to)
    }
}

async fn sales_report(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(range): ApiQuery<RangeQuery>,
) -> ApiResult<Json<SalesSummary>> {
    let (from, to) = range.resolve(Utc::now().date_naive());
    Ok(Json(state.db.reports().sales_summary(&actor, from, to).await?))
}

async fn dashboard(State(state): State<AppState>, CurrentActor(actor): CurrentActor) -> ApiResult<Json<ShopDashboard>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.db.reports().shop_dashboard(&actor, today).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_product, send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_range_defaults() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let (from, to) = RangeQuery::default().resolve(today);
        assert_eq!(to, today);
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());

        let range = RangeQuery {
            from: Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            to: None,
        };
        assert_eq!(range.resolve(today).0, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[tokio::test]
    async fn test_reports_by_role() {
        let app = test_app().await;
        let coke = create_product(&app, "COKE-330", 5, 150).await;

        for token in [&app.shop, &app.cashier] {
            let (status, _) = send(
                &app.router,
                "POST",
                "/api/sales",
                Some(token),
                Some(json!({"payment_method": "cash", "items": [{"product_id": coke, "quantity": 1}]})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app.router, "GET", "/api/reports/sales", Some(&app.shop), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totals"]["transaction_count"], 2);
        assert_eq!(body["totals"]["total_cents"], 300);

        let (_, body) = send(&app.router, "GET", "/api/reports/sales", Some(&app.cashier), None).await;
        assert_eq!(body["totals"]["transaction_count"], 1);

        let (status, body) = send(&app.router, "GET", "/api/reports/dashboard", Some(&app.shop), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["products_to_reorder"], 1);

        let (status, _) = send(&app.router, "GET", "/api/reports/dashboard", Some(&app.cashier), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app.router,
            "GET",
            "/api/reports/sales?from=2024-02-01&to=2024-01-01",
            Some(&app.shop),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
