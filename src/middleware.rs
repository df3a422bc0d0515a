// src/middleware.rs

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::models::User;
use crate::web::response::ApiError;
use crate::web::AppState;

/// The authenticated, active user behind the bearer token.
///
/// The user record is loaded fresh on every request, so role and status
/// changes take effect immediately.
pub struct AuthUser(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;

        let claims = state
            .tokens
            .validate_token(token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

        let user = state
            .service
            .get_user(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;

        if !user.is_active {
            return Err(ApiError::Forbidden("Account is deactivated".into()));
        }

        Ok(AuthUser(user))
    }
}
