//! Bearer token extractors.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header, request::Parts},
};

use super::AppState;
use crate::domain::aggregates::{Merchant, User};
use crate::services::require_merchant;
use crate::ShopError;

/// JSON request body. Malformed bodies are rejected as `ShopError::Validation`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ShopError))]
pub struct JsonBody<T>(pub T);

/// The account behind the request's bearer token.
///
/// ```rust,ignore
/// async fn me(CurrentUser(user): CurrentUser) -> Json<UserProfile> { ... }
/// ```
pub struct CurrentUser(pub User);

/// A merchant account together with its shop profile.
pub struct CurrentMerchant {
    pub user: User,
    pub merchant: Merchant,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| ShopError::Unauthenticated("Not authenticated".into()))?;
        Ok(Self(state.auth.authenticate(token).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentMerchant {
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        let merchant = require_merchant(state.store.as_ref(), &user).await?;
        Ok(Self { user, merchant })
    }
}
