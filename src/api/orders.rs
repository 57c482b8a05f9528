use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{
    extract::{CurrentMerchant, CurrentUser, JsonBody},
    AppState,
};
use crate::domain::aggregates::ShippingDetails;
use crate::services::{LineRequest, OrderView};
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i64,
    pub price_at_purchase: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>)> {
    let lines = req
        .items
        .into_iter()
        .map(|i| LineRequest { product_id: i.product_id, quantity: i.quantity, price_at_purchase: i.price_at_purchase })
        .collect();
    let shipping = ShippingDetails {
        shipping_address: req.shipping_address,
        contact_name: req.contact_name,
        contact_phone: req.contact_phone,
    };
    let order = state.orders.create_order(&user, lines, shipping).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn my_orders(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Vec<OrderView>>> {
    Ok(Json(state.orders.my_orders(&user).await?))
}

pub async fn merchant_orders(State(state): State<AppState>, current: CurrentMerchant) -> Result<Json<Vec<OrderView>>> {
    Ok(Json(state.orders.merchant_orders(&current.merchant).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    current: CurrentMerchant,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<StatusUpdateRequest>,
) -> Result<Json<OrderView>> {
    Ok(Json(state.orders.update_status(&current.merchant, id, &req.status).await?))
}
