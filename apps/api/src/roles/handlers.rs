use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{Resolution, LANDING_ROUTE};
use crate::errors::AppError;
use crate::models::profile::Role;
use crate::session::extract::AuthSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub route: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRoleRequest {
    pub role: Role,
    pub current_route: Option<String>,
}

/// GET /api/v1/roles/resolve
///
/// Returns the role status and the redirect the client should perform from `route`.
pub async fn handle_resolve(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(query): Query<ResolveQuery>,
) -> Json<Resolution> {
    let route = query.route.as_deref().unwrap_or(LANDING_ROUTE);
    let resolver = state.resolvers.resolver_for(session.user.id);
    Json(resolver.resolve(route).await)
}

/// POST /api/v1/roles
///
/// Persists the selection, then moves the resolver straight to `resolved`.
pub async fn handle_select_role(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(req): Json<SelectRoleRequest>,
) -> Result<Json<Resolution>, AppError> {
    let user_id = session.user.id;
    state.profiles.select_role(user_id, req.role).await?;
    info!(%user_id, role = req.role.as_str(), "Role selected");

    let route = req.current_route.as_deref().unwrap_or(LANDING_ROUTE);
    let resolver = state.resolvers.resolver_for(user_id);
    Ok(Json(resolver.set_role(req.role, route)))
}
