use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{extract::{CurrentUser, JsonBody}, AppState};
use crate::domain::aggregates::CartItem;
use crate::services::CartView;
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

pub async fn get_cart(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<CartView>> {
    Ok(Json(state.cart.view(&user).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<Json<CartItem>> {
    Ok(Json(state.cart.add_item(&user, req.product_id, req.quantity).await?))
}

pub async fn update_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdateItemRequest>,
) -> Result<Json<CartItem>> {
    Ok(Json(state.cart.update_item(&user, item_id, req.quantity).await?))
}

pub async fn remove_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Value>> {
    state.cart.remove_item(&user, item_id).await?;
    Ok(Json(json!({ "message": "Item removed from cart" })))
}

pub async fn clear(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Value>> {
    state.cart.clear(&user).await?;
    Ok(Json(json!({ "message": "Cart cleared" })))
}
