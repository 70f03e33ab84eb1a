use axum::{
    extract::{Query, State},
    Json,
};

use super::{employee_dashboard, employer_dashboard, EmployeeDashboard, EmployerDashboard, JobFilter};
use crate::errors::AppError;
use crate::roles::extract::{RequireEmployer, ResolvedUser};
use crate::state::AppState;
use crate::tasks::tracker::task_progress;

/// GET /api/v1/dashboard/employer
pub async fn handle_employer_dashboard(
    State(state): State<AppState>,
    RequireEmployer(user): RequireEmployer,
    Query(filter): Query<JobFilter>,
) -> Result<Json<EmployerDashboard>, AppError> {
    let jobs = state.jobs.jobs_with_counts(user.session.user.id).await?;
    let job_ids: Vec<_> = jobs.iter().map(|j| j.id).collect();
    let applications = if job_ids.is_empty() {
        Vec::new()
    } else {
        state.jobs.applications_for_jobs(&job_ids).await?
    };
    Ok(Json(employer_dashboard(jobs, applications, &filter)))
}

/// GET /api/v1/dashboard/employee
pub async fn handle_employee_dashboard(
    State(state): State<AppState>,
    user: ResolvedUser,
) -> Result<Json<EmployeeDashboard>, AppError> {
    let user_id = user.session.user.id;
    let applications = state.jobs.applications_for_applicant(user_id).await?;
    let tasks = state.tasks.load(user_id).await;
    Ok(Json(employee_dashboard(applications, task_progress(&tasks))))
}
