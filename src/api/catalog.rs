//! Category, product and search endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::{extract::{CurrentMerchant, JsonBody}, AppState};
use crate::domain::aggregates::{Category, NewProduct, Product, ProductPatch, ProductStatus, SearchFilter};
use crate::domain::value_objects::{Money, Page};
use crate::Result;

// -- categories ---------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.catalog.list_categories().await?))
}

pub async fn get_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Category>> {
    Ok(Json(state.catalog.get_category(id).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    _merchant: CurrentMerchant,
    JsonBody(req): JsonBody<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    req.validate()?;
    let category = state.catalog.create_category(&req.name, req.description).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

// -- products -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub status_filter: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub status: Option<String>,
}

pub async fn list_products(State(state): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<Vec<Product>>> {
    let status = p.status_filter.as_deref().map(str::parse::<ProductStatus>).transpose()?;
    Ok(Json(state.catalog.list_products(status, Page::new(p.skip, p.limit)).await?))
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    Ok(Json(state.catalog.get_product(id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    current: CurrentMerchant,
    JsonBody(req): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    req.validate()?;
    let new = NewProduct {
        name: req.name,
        description: req.description,
        price: Money::positive(req.price)?,
        category_id: req.category_id,
    };
    let product = state.catalog.create_product(&current.merchant, new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current: CurrentMerchant,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdateProductRequest>,
) -> Result<Json<Product>> {
    req.validate()?;
    let patch = ProductPatch {
        name: req.name,
        description: req.description,
        price: req.price.map(Money::positive).transpose()?,
        category_id: req.category_id,
        status: req.status.as_deref().map(str::parse::<ProductStatus>).transpose()?,
    };
    Ok(Json(state.catalog.update_product(&current.merchant, id, patch).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    current: CurrentMerchant,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    state.catalog.delete_product(&current.merchant, id).await?;
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}

pub async fn my_products(State(state): State<AppState>, current: CurrentMerchant) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog.my_products(&current.merchant).await?))
}

// -- search -------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn search(State(state): State<AppState>, Query(p): Query<SearchParams>) -> Result<Json<Vec<Product>>> {
    let filter = SearchFilter { keyword: p.q, min_price: p.min_price, max_price: p.max_price, category_id: p.category_id };
    Ok(Json(state.catalog.search(&filter, Page::new(p.skip, p.limit)).await?))
}
