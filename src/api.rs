//! REST surface: typed request/response schemas over the [`Store`] contract.
//!
//! The session id arrives in the `x-session-id` header; a missing or blank
//! header falls back to a shared default session, matching the browser
//! client's behavior before it has minted a session id.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::domain::{CartEntry, CheckoutDetails, Order, Product};
use crate::error::StoreError;
use crate::store::Store;

pub const SESSION_HEADER: &str = "x-session-id";
const DEFAULT_SESSION: &str = "default-session";

pub type SharedStore = Arc<dyn Store>;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/products", get(list_products))
        .route("/api/products/:id", get(get_product))
        .route("/api/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/api/cart/:product_id", put(update_cart_item).delete(remove_cart_item))
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/:id", get(get_order))
        .with_state(store)
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "shopfront",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
struct ProductQuery {
    q: Option<String>,
}

async fn list_products(
    State(store): State<SharedStore>,
    Query(params): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, StoreError> {
    let products = match params.q.as_deref() {
        Some(q) if !q.is_empty() => store.search_products(q).await?,
        _ => store.list_products().await?,
    };
    Ok(Json(products))
}

async fn get_product(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Json<Product>, StoreError> {
    Ok(Json(store.product(&id).await?))
}

async fn get_cart(
    State(store): State<SharedStore>,
    headers: HeaderMap,
) -> Result<Json<Vec<CartEntry>>, StoreError> {
    Ok(Json(store.cart(&session_id(&headers)).await?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct AddToCartRequest {
    #[validate(length(min = 1, message = "productId must not be empty"))]
    product_id: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    quantity: i64,
}

async fn add_to_cart(
    State(store): State<SharedStore>,
    headers: HeaderMap,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<Vec<CartEntry>>, StoreError> {
    req.validate().map_err(|e| StoreError::InvalidInput(e.to_string()))?;
    let quantity = u32::try_from(req.quantity)
        .map_err(|_| StoreError::InvalidInput("quantity out of range".into()))?;
    let cart = store
        .add_to_cart(&session_id(&headers), &req.product_id, quantity)
        .await?;
    Ok(Json(cart))
}

#[derive(Debug, Deserialize)]
struct UpdateCartRequest {
    quantity: i64,
}

async fn update_cart_item(
    State(store): State<SharedStore>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateCartRequest>,
) -> Result<Json<Vec<CartEntry>>, StoreError> {
    // Zero or negative means "drop the line", per the cart contract.
    let quantity = u32::try_from(req.quantity.max(0))
        .map_err(|_| StoreError::InvalidInput("quantity out of range".into()))?;
    let cart = store
        .set_cart_quantity(&session_id(&headers), &product_id, quantity)
        .await?;
    Ok(Json(cart))
}

async fn remove_cart_item(
    State(store): State<SharedStore>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<CartEntry>>, StoreError> {
    let cart = store.remove_from_cart(&session_id(&headers), &product_id).await?;
    Ok(Json(cart))
}

async fn clear_cart(
    State(store): State<SharedStore>,
    headers: HeaderMap,
) -> Result<Json<Vec<CartEntry>>, StoreError> {
    store.clear_cart(&session_id(&headers)).await?;
    Ok(Json(Vec::new()))
}

async fn list_orders(State(store): State<SharedStore>) -> Result<Json<Vec<Order>>, StoreError> {
    Ok(Json(store.list_orders().await?))
}

async fn create_order(
    State(store): State<SharedStore>,
    headers: HeaderMap,
    Json(details): Json<CheckoutDetails>,
) -> Result<(StatusCode, Json<Order>), StoreError> {
    let order = store.place_order(&session_id(&headers), details).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Json<Order>, StoreError> {
    Ok(Json(store.order(&id).await?))
}
