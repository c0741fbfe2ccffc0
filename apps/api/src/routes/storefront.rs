//! Storefront management routes.
//!
//! Shop admins set up their public page, list web products and work the
//! order queue here. The anonymous shopper side lives in [`super::shop`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use shopdesk_core::storefront::{ListedProduct, Order, OrderDetail, OrderStatus, PaymentStatus, ShopProduct, ShopProfile};
use shopdesk_db::{NewShopProduct, ShopProductUpdate, StorefrontSetup};

use crate::auth::CurrentActor;
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/storefront",
            get(get_profile).post(setup_storefront).put(update_profile),
        )
        .route("/api/storefront/products", get(list_products).post(create_product))
        .route("/api/storefront/products/{id}", put(update_product).delete(retire_product))
        .route("/api/storefront/orders", get(list_orders))
        .route("/api/storefront/orders/{id}", get(get_order))
        .route("/api/storefront/orders/{id}/status", post(update_order_status))
        .route("/api/storefront/orders/{id}/payment-status", post(update_payment_status))
}

// =============================================================================
// Request Types
// =============================================================================

/// Site admins pick the shop with `?tenant_id=`.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub tenant_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

// =============================================================================
// Profile
// =============================================================================

async fn get_profile(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<ProfileQuery>,
) -> ApiResult<Json<ShopProfile>> {
    let profile = state.db.storefront().profile(&actor, query.tenant_id.as_deref()).await?;
    Ok(Json(profile))
}

async fn setup_storefront(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(setup): ApiJson<StorefrontSetup>,
) -> ApiResult<(StatusCode, Json<ShopProfile>)> {
    let profile = state.db.storefront().setup(&actor, setup).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(update): ApiJson<StorefrontSetup>,
) -> ApiResult<Json<ShopProfile>> {
    Ok(Json(state.db.storefront().update_profile(&actor, update).await?))
}

// =============================================================================
// Web Products
// =============================================================================

async fn list_products(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<ListedProduct>>> {
    Ok(Json(state.db.storefront().list_products(&actor.scope()?).await?))
}

async fn create_product(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(new): ApiJson<NewShopProduct>,
) -> ApiResult<(StatusCode, Json<ShopProduct>)> {
    let product = state.db.storefront().create_product(&actor, new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ShopProductUpdate>,
) -> ApiResult<Json<ShopProduct>> {
    Ok(Json(state.db.storefront().update_product(&actor, &id, update).await?))
}

async fn retire_product(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.storefront().retire_product(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

async fn list_orders(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = state.db.storefront().list_orders(&actor.scope()?, query.status).await?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderDetail>> {
    Ok(Json(state.db.storefront().order(&actor.scope()?, &id).await?))
}

async fn update_order_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<OrderStatusRequest>,
) -> ApiResult<Json<Order>> {
    let order = state.db.storefront().update_order_status(&actor, &id, request.status).await?;
    Ok(Json(order))
}

async fn update_payment_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<PaymentStatusRequest>,
) -> ApiResult<Json<Order>> {
    let order = state
        .db
        .storefront()
        .update_payment_status(&actor, &id, request.payment_status)
        .await?;
    Ok(Json(order))
}
