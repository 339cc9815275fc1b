use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{cart_total, item_count, CartLine, CartLineDetails},
    error::Result,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotalResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub item_count: i64,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<CartLineDetails>>> {
    let lines = state.service_context.cart_service
        .list(current.user.id)
        .await?;

    Ok(Json(lines))
}

pub async fn add(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartLine>)> {
    let line = state.service_context.cart_service
        .add_item(current.user.id, req.product_id, req.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn total(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<CartTotalResponse>> {
    let lines = state.service_context.cart_service
        .list(current.user.id)
        .await?;

    Ok(Json(CartTotalResponse {
        total: cart_total(&lines)?,
        item_count: item_count(&lines)?,
    }))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<CartLine>> {
    let line = state.service_context.cart_service
        .set_quantity(current.user.id, id, req.quantity)
        .await?;

    Ok(Json(line))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    state.service_context.cart_service
        .remove_item(current.user.id, id)
        .await?;

    Ok(Json(json!({ "message": "Item removed from cart" })))
}
