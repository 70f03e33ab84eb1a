use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::service::{
    apply_to_job, create_job_posting, update_application_status, update_job_posting, ApplyInput,
    JobPostingInput,
};
use crate::errors::AppError;
use crate::models::job::{
    ApplicationView, CompanyRow, JobApplicationRow, JobOpeningRow, JobWithApplicationCount,
};
use crate::roles::extract::{RequireEmployer, ResolvedUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApplicationsQuery {
    /// Comma-separated job ids. Defaults to all of the employer's jobs.
    pub job_ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

fn parse_job_ids(raw: &str) -> Result<Vec<Uuid>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s).map_err(|_| AppError::Validation(format!("Invalid job id '{s}'")))
        })
        .collect()
}

/// GET /api/v1/companies
pub async fn handle_list_companies(
    State(state): State<AppState>,
    RequireEmployer(user): RequireEmployer,
) -> Result<Json<Vec<CompanyRow>>, AppError> {
    Ok(Json(state.jobs.list_companies(user.session.user.id).await?))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    RequireEmployer(user): RequireEmployer,
) -> Result<Json<Vec<JobWithApplicationCount>>, AppError> {
    Ok(Json(state.jobs.jobs_with_counts(user.session.user.id).await?))
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    RequireEmployer(user): RequireEmployer,
    Json(input): Json<JobPostingInput>,
) -> Result<(StatusCode, Json<JobOpeningRow>), AppError> {
    let job = create_job_posting(
        state.jobs.as_ref(),
        user.session.user.id,
        input,
        &state.config.public_app_url,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    RequireEmployer(user): RequireEmployer,
    Path(job_id): Path<Uuid>,
    Json(input): Json<JobPostingInput>,
) -> Result<Json<JobOpeningRow>, AppError> {
    let job = update_job_posting(state.jobs.as_ref(), user.session.user.id, job_id, input).await?;
    Ok(Json(job))
}

/// POST /api/v1/jobs/:id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    user: ResolvedUser,
    Path(job_id): Path<Uuid>,
    Json(input): Json<ApplyInput>,
) -> Result<(StatusCode, Json<JobApplicationRow>), AppError> {
    let application =
        apply_to_job(state.jobs.as_ref(), user.session.user.id, job_id, input).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/v1/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    RequireEmployer(user): RequireEmployer,
    Query(query): Query<ApplicationsQuery>,
) -> Result<Json<Vec<ApplicationView>>, AppError> {
    let owned: Vec<Uuid> = state
        .jobs
        .jobs_with_counts(user.session.user.id)
        .await?
        .into_iter()
        .map(|j| j.id)
        .collect();

    // Requested ids outside the employer's own jobs are silently dropped.
    let job_ids = match query.job_ids.as_deref() {
        Some(raw) => parse_job_ids(raw)?
            .into_iter()
            .filter(|id| owned.contains(id))
            .collect(),
        None => owned,
    };
    if job_ids.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(state.jobs.applications_for_jobs(&job_ids).await?))
}

/// PATCH /api/v1/applications/:id/status
pub async fn handle_update_application_status(
    State(state): State<AppState>,
    RequireEmployer(user): RequireEmployer,
    Path(application_id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<JobApplicationRow>, AppError> {
    let application = update_application_status(
        state.jobs.as_ref(),
        user.session.user.id,
        application_id,
        &req.status,
    )
    .await?;
    Ok(Json(application))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_ids_skips_blanks() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_job_ids(&format!("{a}, ,{b},")).unwrap();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_parse_job_ids_rejects_garbage() {
        assert!(matches!(
            parse_job_ids("not-a-uuid"),
            Err(AppError::Validation(_))
        ));
    }
}
