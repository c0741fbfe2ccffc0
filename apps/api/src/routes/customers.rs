//! Customer routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use shopdesk_core::{Customer, CustomerCredit};
use shopdesk_db::{CustomerUpdate, NewCustomer};

use crate::auth::CurrentActor;
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route("/api/customers/{id}", get(get_customer).put(update_customer))
        .route("/api/customers/{id}/credit", get(customer_credit))
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub q: Option<String>,
}

async fn list_customers(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<CustomerQuery>,
) -> ApiResult<Json<Vec<Customer>>> {
    let customers = state.db.customers().list(&actor.scope()?, query.q.as_deref()).await?;
    Ok(Json(customers))
}

async fn create_customer(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(new): ApiJson<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = state.db.customers().create(&actor, new).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn get_customer(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.db.customers().get(&actor.scope()?, &id).await?))
}

async fn update_customer(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<CustomerUpdate>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.db.customers().update(&actor, &id, update).await?))
}

async fn customer_credit(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<CustomerCredit>> {
    Ok(Json(state.db.customers().credit(&actor.scope()?, &id).await?))
}

#[cfg(test)]
mod tests {
    use crate::testing::{send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_cashier_registers_customer() {
        let app = test_app().await;

        let (status, body) = send(
            &app.router,
            "POST",
            "/api/customers",
            Some(&app.cashier),
            Some(json!({"name": "Ann", "credit_limit_cents": 5000})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["tenant_id"], app.shop_id.as_str());
        let uri = format!("/api/customers/{}/credit", body["id"].as_str().unwrap());

        let (status, body) = send(&app.router, "GET", &uri, Some(&app.shop), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available_credit_cents"], 5000);

        let (status, _) = send(&app.router, "GET", &uri, Some(&app.other_shop), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_body_is_a_validation_error() {
        let app = test_app().await;

        let (status, body) = send(
            &app.router,
            "POST",
            "/api/customers",
            Some(&app.shop),
            Some(json!({"credit_limit_cents": "lots"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/customers",
            Some(&app.shop),
            Some(json!({"name": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
