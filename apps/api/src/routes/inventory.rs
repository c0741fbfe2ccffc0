//! Product, stock and supplier routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use shopdesk_core::{Product, StockMovement, Supplier};
use shopdesk_db::{NewProduct, NewSupplier, ProductUpdate, StockAdjustmentRequest};

use crate::auth::CurrentActor;
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::state::AppState;

const DEFAULT_MOVEMENT_LIMIT: u32 = 100;
const MAX_MOVEMENT_LIMIT: u32 = 500;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/suppliers", get(list_suppliers).post(create_supplier))
        .route(
            "/api/suppliers/{id}",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route("/api/products", get(list_products).post(create_product))
        .route(
            "/api/products/{id}",
            get(get_product).put(update_product).delete(deactivate_product),
        )
        .route("/api/products/{id}/stock", post(adjust_stock))
        .route("/api/stock/movements", get(list_movements))
        .route("/api/stock/low", get(low_stock))
}

// =============================================================================
// Suppliers
// =============================================================================

async fn list_suppliers(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<Supplier>>> {
    Ok(Json(state.db.suppliers().list(&actor.scope()?).await?))
}

async fn create_supplier(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(new): ApiJson<NewSupplier>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    let supplier = state.db.suppliers().create(&actor, new).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

async fn get_supplier(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Supplier>> {
    Ok(Json(state.db.suppliers().get(&actor.scope()?, &id).await?))
}

async fn update_supplier(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<NewSupplier>,
) -> ApiResult<Json<Supplier>> {
    Ok(Json(state.db.suppliers().update(&actor, &id, update).await?))
}

async fn delete_supplier(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.suppliers().delete(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    /// Matched against name, SKU and barcode.
    pub q: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

async fn list_products(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let products = state
        .db
        .products()
        .list(&actor.scope()?, query.q.as_deref(), query.include_inactive)
        .await?;
    Ok(Json(products))
}

async fn create_product(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(new): ApiJson<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.db.products().create(&actor, new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().get(&actor.scope()?, &id).await?))
}

async fn update_product(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ProductUpdate>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().update(&actor, &id, update).await?))
}

/// Products are never hard-deleted; sale history keeps pointing at them.
async fn deactivate_product(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().deactivate(&actor, &id).await?))
}

// =============================================================================
// Stock
// =============================================================================

async fn adjust_stock(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<StockAdjustmentRequest>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().adjust_stock(&actor, &id, request).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub product_id: Option<String>,
    pub limit: Option<u32>,
}

async fn list_movements(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<MovementQuery>,
) -> ApiResult<Json<Vec<StockMovement>>> {
    let limit = query.limit.unwrap_or(DEFAULT_MOVEMENT_LIMIT).clamp(1, MAX_MOVEMENT_LIMIT);
    let movements = state
        .db
        .products()
        .movements(&actor.scope()?, query.product_id.as_deref(), limit)
        .await?;
    Ok(Json(movements))
}

async fn low_stock(State(state): State<AppState>, CurrentActor(actor): CurrentActor) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.products().low_stock(&actor.scope()?).await?))
}
