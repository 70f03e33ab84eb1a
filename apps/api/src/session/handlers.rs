use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::extract::AuthSession;
use super::{AuthClientError, Session};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInQuery {
    pub provider: String,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub url: String,
}

/// GET /api/v1/auth/sign-in
pub async fn handle_sign_in(
    State(state): State<AppState>,
    Query(query): Query<SignInQuery>,
) -> Result<Json<SignInResponse>, AppError> {
    let redirect_to = query
        .redirect_to
        .unwrap_or_else(|| format!("{}/dashboard", state.config.public_app_url));
    let url = state
        .sessions
        .sign_in_url(&query.provider, &redirect_to)
        .map_err(|e| match e {
            AuthClientError::UnsupportedProvider(p) => {
                AppError::Validation(format!("Unsupported identity provider '{p}'"))
            }
            other => AppError::Auth(other.to_string()),
        })?;
    Ok(Json(SignInResponse { url }))
}

/// POST /api/v1/auth/sign-out
pub async fn handle_sign_out(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .sign_out(&session)
        .await
        .map_err(|e| AppError::Auth(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/session
pub async fn handle_get_session(AuthSession(session): AuthSession) -> Json<Session> {
    Json(session)
}
