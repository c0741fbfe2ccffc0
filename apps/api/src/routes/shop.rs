//! Public storefront routes.
//!
//! No login: the shop is picked by slug and carts by their random id.
//!
//! ```text
//! GET  /shop/{slug}/products
//! POST /shop/{slug}/carts                      -> new cart
//! POST /shop/{slug}/carts/{cart}/items         -> add
//! PUT  /shop/{slug}/carts/{cart}/items/{id}    -> set quantity
//! POST /shop/{slug}/carts/{cart}/checkout      -> order
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use shopdesk_core::storefront::{CartView, CheckoutDetails, ListedProduct, OrderDetail};

use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/shop/{slug}/products", get(list_products))
        .route("/shop/{slug}/carts", post(create_cart))
        .route("/shop/{slug}/carts/{cart_id}", get(get_cart))
        .route("/shop/{slug}/carts/{cart_id}/items", post(add_item))
        .route(
            "/shop/{slug}/carts/{cart_id}/items/{product_id}",
            put(update_item).delete(remove_item),
        )
        .route("/shop/{slug}/carts/{cart_id}/checkout", post(checkout))
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

async fn list_products(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<Vec<ListedProduct>>> {
    Ok(Json(state.db.storefront().public_products(&slug).await?))
}

async fn create_cart(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<(StatusCode, Json<CartView>)> {
    let cart = state.db.storefront().create_cart(&slug).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

async fn get_cart(
    State(state): State<AppState>,
    Path((slug, cart_id)): Path<(String, String)>,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.db.storefront().cart(&slug, &cart_id).await?))
}

async fn add_item(
    State(state): State<AppState>,
    Path((slug, cart_id)): Path<(String, String)>,
    ApiJson(request): ApiJson<AddItemRequest>,
) -> ApiResult<Json<CartView>> {
    let cart = state
        .db
        .storefront()
        .add_to_cart(&slug, &cart_id, &request.product_id, request.quantity)
        .await?;
    Ok(Json(cart))
}

async fn update_item(
    State(state): State<AppState>,
    Path((slug, cart_id, product_id)): Path<(String, String, String)>,
    ApiJson(request): ApiJson<QuantityRequest>,
) -> ApiResult<Json<CartView>> {
    let cart = state
        .db
        .storefront()
        .update_cart_item(&slug, &cart_id, &product_id, request.quantity)
        .await?;
    Ok(Json(cart))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((slug, cart_id, product_id)): Path<(String, String, String)>,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.db.storefront().remove_cart_item(&slug, &cart_id, &product_id).await?))
}

async fn checkout(
    State(state): State<AppState>,
    Path((slug, cart_id)): Path<(String, String)>,
    ApiJson(details): ApiJson<CheckoutDetails>,
) -> ApiResult<(StatusCode, Json<OrderDetail>)> {
    let order = state.db.storefront().checkout(&slug, &cart_id, details).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
