use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use super::{extract::{CurrentMerchant, JsonBody}, AppState};
use crate::domain::aggregates::{Merchant, MerchantPatch};
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
pub struct MerchantUpdate {
    #[validate(length(min = 1, max = 100))]
    pub shop_name: Option<String>,
    pub description: Option<String>,
}

pub async fn profile(current: CurrentMerchant) -> Json<Merchant> {
    Json(current.merchant)
}

pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentMerchant,
    JsonBody(req): JsonBody<MerchantUpdate>,
) -> Result<Json<Merchant>> {
    req.validate()?;
    let patch = MerchantPatch { shop_name: req.shop_name, description: req.description };
    Ok(Json(state.merchants.update_profile(&current.user, patch).await?))
}
