//! Sale routes.
//!
//! A sale is rung up in one request; the repository decrements stock,
//! writes the sale and, for credit sales, opens the debt in a single
//! transaction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use shopdesk_core::sale::{Sale, SaleDetail};
use shopdesk_db::{NewSale, SaleFilter};
use tracing::info;

use crate::auth::CurrentActor;
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sales", get(list_sales).post(create_sale))
        .route("/api/sales/{id}", get(get_sale))
        .route("/api/sales/{id}/delete", post(delete_sale))
}

/// Deleting a sale must repeat its sale number.
#[derive(Debug, Deserialize)]
pub struct DeleteSaleRequest {
    pub confirmation: String,
}

async fn list_sales(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(filter): ApiQuery<SaleFilter>,
) -> ApiResult<Json<Vec<Sale>>> {
    Ok(Json(state.db.sales().list(&actor, filter).await?))
}

async fn create_sale(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<NewSale>,
) -> ApiResult<(StatusCode, Json<SaleDetail>)> {
    let sale = state.db.sales().process(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

async fn get_sale(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    Ok(Json(state.db.sales().get(&actor, &id).await?))
}

async fn delete_sale(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<DeleteSaleRequest>,
) -> ApiResult<StatusCode> {
    state.db.sales().delete(&actor, &id, &request.confirmation).await?;
    info!(sale_id = %id, user = %actor.username, "Sale deleted via API");
    Ok(StatusCode::NO_CONTENT)
}
