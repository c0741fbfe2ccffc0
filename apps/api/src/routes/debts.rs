//! Debt routes.
//!
//! Debts are opened by credit sales only; the API lists them and records
//! repayments. Balance and status are derived on every read.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use shopdesk_core::debt::{DebtDetail, DebtSummary};
use shopdesk_db::{DebtFilter, NewDebtPayment};

use crate::auth::CurrentActor;
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/debts", get(list_debts))
        .route("/api/debts/{id}", get(get_debt))
        .route("/api/debts/{id}/payments", post(record_payment))
}

async fn list_debts(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(filter): ApiQuery<DebtFilter>,
) -> ApiResult<Json<Vec<DebtSummary>>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.db.debts().list(&actor.scope()?, today, filter).await?))
}

async fn get_debt(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<DebtDetail>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.db.debts().get(&actor.scope()?, &id, today).await?))
}

async fn record_payment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(payment): ApiJson<NewDebtPayment>,
) -> ApiResult<Json<DebtDetail>> {
    Ok(Json(state.db.debts().record_payment(&actor, &id, payment).await?))
}
