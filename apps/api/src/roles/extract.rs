//! Extractors gating handlers on a resolved role.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::RoleStatus;
use crate::errors::AppError;
use crate::models::profile::Role;
use crate::session::extract::AuthSession;
use crate::session::Session;
use crate::state::AppState;

/// A session whose role has been resolved.
pub struct ResolvedUser {
    pub session: Session,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for ResolvedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthSession(session) = AuthSession::from_request_parts(parts, state).await?;
        let resolver = state.resolvers.resolver_for(session.user.id);

        let status = match resolver.status() {
            RoleStatus::Resolved(role) => RoleStatus::Resolved(role),
            // Waits out a lookup another request already started.
            _ => resolver.settled_status().await,
        };

        match status {
            RoleStatus::Resolved(role) => Ok(ResolvedUser { session, role }),
            _ => Err(AppError::Forbidden("Select a role first".to_string())),
        }
    }
}

/// Requires the `employer` role.
pub struct RequireEmployer(pub ResolvedUser);

#[async_trait]
impl FromRequestParts<AppState> for RequireEmployer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = ResolvedUser::from_request_parts(parts, state).await?;
        if user.role != Role::Employer {
            return Err(AppError::Forbidden("Employer role required".to_string()));
        }
        Ok(RequireEmployer(user))
    }
}
