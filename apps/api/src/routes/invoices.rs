//! Invoice routes.
//!
//! ```text
//!  POST /api/invoices ──► Draft ──send──► Sent ──payments──► Paid
//!                           │  items,      │
//!                           │  header edits│
//!                           └──cancel──────┴──► Cancelled (no payments yet)
//!
//!  GET /public/invoices/{share_token}   read-only, no login
//! ```

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use shopdesk_core::invoice::{InvoiceDashboard, InvoiceDetail, InvoiceSummary};
use shopdesk_db::{InvoiceFilter, InvoiceUpdate, NewInvoice, NewInvoiceItem, NewInvoicePayment};

use crate::auth::CurrentActor;
use crate::error::{ApiError, ApiJson, ApiQuery, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/invoices", get(list_invoices).post(create_invoice))
        .route("/api/invoices/dashboard", get(dashboard))
        .route(
            "/api/invoices/{id}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/api/invoices/{id}/items", post(add_item))
        .route("/api/invoices/{id}/items/{item_id}", delete(remove_item))
        .route("/api/invoices/{id}/send", post(send_invoice))
        .route("/api/invoices/{id}/cancel", post(cancel_invoice))
        .route("/api/invoices/{id}/payments", post(add_payment))
        .route("/public/invoices/{token}", get(public_invoice))
}

/// Optional body of `DELETE /api/invoices/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteInvoiceRequest {
    /// Invoice number; required once payments exist.
    pub confirmation: Option<String>,
}

impl DeleteInvoiceRequest {
    fn from_body(body: &[u8]) -> ApiResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(DeleteInvoiceRequest::default());
        }
        serde_json::from_slice(body).map_err(|e| ApiError::validation(format!("Invalid JSON body: {}", e)))
    }
}

async fn list_invoices(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(filter): ApiQuery<InvoiceFilter>,
) -> ApiResult<Json<Vec<InvoiceSummary>>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.db.invoices().list(&actor.scope()?, today, filter).await?))
}

async fn create_invoice(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(new): ApiJson<NewInvoice>,
) -> ApiResult<(StatusCode, Json<InvoiceDetail>)> {
    let invoice = state.db.invoices().create(&actor, new).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn dashboard(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<InvoiceDashboard>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.db.invoices().dashboard(&actor.scope()?, today).await?))
}

async fn get_invoice(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceDetail>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.db.invoices().get(&actor.scope()?, &id, today).await?))
}

async fn update_invoice(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<InvoiceUpdate>,
) -> ApiResult<Json<InvoiceDetail>> {
    Ok(Json(state.db.invoices().update(&actor, &id, update).await?))
}

async fn delete_invoice(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request = DeleteInvoiceRequest::from_body(&body)?;
    state
        .db
        .invoices()
        .delete(&actor, &id, request.confirmation.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_item(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(item): ApiJson<NewInvoiceItem>,
) -> ApiResult<Json<InvoiceDetail>> {
    Ok(Json(state.db.invoices().add_item(&actor, &id, item).await?))
}

async fn remove_item(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((id, item_id)): Path<(String, String)>,
) -> ApiResult<Json<InvoiceDetail>> {
    Ok(Json(state.db.invoices().remove_item(&actor, &id, &item_id).await?))
}

async fn send_invoice(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceDetail>> {
    Ok(Json(state.db.invoices().send(&actor, &id).await?))
}

async fn cancel_invoice(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceDetail>> {
    Ok(Json(state.db.invoices().cancel(&actor, &id).await?))
}

async fn add_payment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(payment): ApiJson<NewInvoicePayment>,
) -> ApiResult<Json<InvoiceDetail>> {
    Ok(Json(state.db.invoices().add_payment(&actor, &id, payment).await?))
}

async fn public_invoice(State(state): State<AppState>, Path(token): Path<String>) -> ApiResult<Json<InvoiceDetail>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.db.invoices().public(&token, today).await?))
}
