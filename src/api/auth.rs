use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use validator::Validate;

use super::{extract::{CurrentUser, JsonBody}, AppState};
use crate::domain::aggregates::Role;
use crate::services::{LoginOutcome, Registration, UserProfile};
use crate::Result;

fn default_role() -> String { Role::User.as_str().to_owned() }

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 255))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    req.validate()?;
    let role: Role = req.role.parse()?;
    let profile = state
        .auth
        .register(Registration { username: req.username, email: req.email, password: req.password, role })
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn login(State(state): State<AppState>, JsonBody(req): JsonBody<LoginRequest>) -> Result<Json<LoginOutcome>> {
    Ok(Json(state.auth.login(&req.username, &req.password).await?))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}
