//! Role resolution: decides which dashboard a signed-in user belongs on.
//!
//! Status is tri-state: `checking` until a profile lookup completes, then
//! `unselected` or `resolved(role)`. Navigation is never performed here; the
//! resolver returns a [`RouteAction`] and the caller's router executes it.
//! [`redirect_for`] is a pure function of status and current route, so a
//! client already on its dashboard never gets redirected again.
//!
//! Routes: `/dashboard` is the neutral landing (role selection) page; the
//! employer and employee dashboards live below it, as does the employer's
//! job posting form at `/dashboard/employer/create`.

pub mod extract;
pub mod handlers;
pub mod resolver;
pub mod store;

use serde::Serialize;

use crate::models::profile::Role;

pub const LANDING_ROUTE: &str = "/dashboard";
pub const EMPLOYER_DASHBOARD_ROUTE: &str = "/dashboard/employer";
pub const EMPLOYEE_DASHBOARD_ROUTE: &str = "/dashboard/employee";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "role", rename_all = "snake_case")]
pub enum RoleStatus {
    Checking,
    Unselected,
    Resolved(Role),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteAction {
    None,
    Redirect { to: String },
}

/// How a [`Resolution`] was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// A profile lookup completed and decided the status.
    Lookup,
    /// Another lookup for this session is in flight; nothing was done.
    Pending,
    /// The lookup failed; status degraded to unselected without a redirect.
    Degraded,
    /// An explicit role selection set the status.
    Override,
    /// A lookup completed after an override and its result was discarded.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    #[serde(flatten)]
    pub status: RoleStatus,
    pub action: RouteAction,
    pub source: ResolutionSource,
}

pub fn dashboard_route(role: Role) -> &'static str {
    match role {
        Role::Employer => EMPLOYER_DASHBOARD_ROUTE,
        _ => EMPLOYEE_DASHBOARD_ROUTE,
    }
}

fn normalize(route: &str) -> &str {
    let path = route.split(['?', '#']).next().unwrap_or(route);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

pub fn is_landing_route(route: &str) -> bool {
    normalize(route) == LANDING_ROUTE
}

/// Routes under a role-specific dashboard subtree.
pub fn is_role_scoped_route(route: &str) -> bool {
    let path = normalize(route);
    [EMPLOYER_DASHBOARD_ROUTE, EMPLOYEE_DASHBOARD_ROUTE]
        .iter()
        .any(|root| path == *root || path.starts_with(&format!("{root}/")))
}

pub fn redirect_for(status: RoleStatus, current_route: &str) -> RouteAction {
    match status {
        RoleStatus::Resolved(role) if is_landing_route(current_route) => RouteAction::Redirect {
            to: dashboard_route(role).to_string(),
        },
        RoleStatus::Unselected if is_role_scoped_route(current_route) => RouteAction::Redirect {
            to: LANDING_ROUTE.to_string(),
        },
        _ => RouteAction::None,
    }
}
