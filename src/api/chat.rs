use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{extract::{CurrentUser, JsonBody}, AppState};
use crate::services::ChatReply;
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    pub merchant_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

pub async fn chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<ChatRequest>,
) -> Result<Json<ChatReply>> {
    req.validate()?;
    Ok(Json(state.chat.chat(&user, req.merchant_id, &req.message).await?))
}
