use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use super::Session;
use crate::errors::AppError;
use crate::state::AppState;

/// Verified session from the `Authorization: Bearer <token>` header.
pub struct AuthSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let session = state.sessions.current_session(token).map_err(|e| {
            debug!("Rejected access token: {e}");
            AppError::Unauthorized
        })?;

        Ok(AuthSession(session))
    }
}
