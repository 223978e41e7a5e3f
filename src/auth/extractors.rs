use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{debug, warn};

use super::{jwt::JwtKeys, repo::UserStore, repo_types::User};
use crate::{error::AppError, state::AppState};

/// Authenticated identity for the current request.
///
/// Taking this extractor is what makes a route protected: the token is read
/// from `Authorization: Bearer <token>`, verified, and resolved to a stored
/// user. Any failure ends the request with a 401.
pub struct AuthUser(pub User);

/// Token carried in the Authorization header. `None` only when the header is
/// absent or unreadable; a header without the Bearer scheme is passed through
/// whole and fails verification.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    Some(
        raw.strip_prefix("Bearer ")
            .or_else(|| raw.strip_prefix("bearer "))
            .unwrap_or(raw)
            .trim(),
    )
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::AuthRequired)?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(reason = %e, "rejected token");
            AppError::InvalidToken
        })?;

        let user = state
            .store
            .find_user_by_id(claims.user_id)
            .await?
            .ok_or_else(|| {
                debug!(user_id = %claims.user_id, "token for missing user");
                AppError::UserNotFound
            })?;

        Ok(AuthUser(user))
    }
}
