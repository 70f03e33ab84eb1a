//! Validation and write orchestration for job postings and applications.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::repository::{JobFields, JobLink, JobRepository, NewApplication, NewJob};
use crate::errors::AppError;
use crate::models::job::{JobApplicationRow, JobOpeningRow, APPLICATION_STATUSES, JOB_STATUSES};

/// Job posting form input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobPostingInput {
    pub company_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub salary_range: Option<String>,
    pub status: Option<String>,
    pub application_link: Option<String>,
    #[serde(default)]
    pub generate_link: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyInput {
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_fields(input: &JobPostingInput) -> Result<JobFields, AppError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }
    let status = input.status.as_deref().unwrap_or("open");
    if !JOB_STATUSES.contains(&status) {
        return Err(AppError::Validation(format!(
            "status must be one of: {}",
            JOB_STATUSES.join(", ")
        )));
    }
    Ok(JobFields {
        title: title.to_string(),
        description: input.description.trim().to_string(),
        location: non_blank(input.location.clone()),
        employment_type: non_blank(input.employment_type.clone()),
        salary_range: non_blank(input.salary_range.clone()),
        status: status.to_string(),
    })
}

/// Creates a posting. With `generate_link`, the row is inserted without a
/// link and then updated with one embedding the generated id, atomically.
/// Input errors are returned before anything is written.
pub async fn create_job_posting(
    repo: &dyn JobRepository,
    employer_id: Uuid,
    input: JobPostingInput,
    link_base: &str,
) -> Result<JobOpeningRow, AppError> {
    let company_id = input
        .company_id
        .ok_or_else(|| AppError::Validation("Please select a company".to_string()))?;
    let fields = validate_fields(&input)?;

    if !repo.company_owned_by(company_id, employer_id).await? {
        return Err(AppError::Forbidden(
            "Company does not belong to this employer".to_string(),
        ));
    }

    let link = if input.generate_link {
        JobLink::Generated {
            base: link_base.to_string(),
        }
    } else {
        JobLink::Provided(non_blank(input.application_link))
    };
    let job = repo
        .create_job(&NewJob {
            company_id,
            employer_id,
            fields,
            link,
        })
        .await?;

    info!(job_id = %job.id, %company_id, %employer_id, "Job posting created");
    Ok(job)
}

pub async fn update_job_posting(
    repo: &dyn JobRepository,
    employer_id: Uuid,
    job_id: Uuid,
    input: JobPostingInput,
) -> Result<JobOpeningRow, AppError> {
    let fields = validate_fields(&input)?;
    let job = repo
        .update_job(job_id, employer_id, &fields)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
    info!(%job_id, "Job posting updated");
    Ok(job)
}

pub async fn apply_to_job(
    repo: &dyn JobRepository,
    applicant_id: Uuid,
    job_id: Uuid,
    input: ApplyInput,
) -> Result<JobApplicationRow, AppError> {
    let job = repo
        .job_by_id(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
    if job.status != "open" {
        return Err(AppError::Validation(
            "This job is not accepting applications".to_string(),
        ));
    }
    if job.employer_id == applicant_id {
        return Err(AppError::Validation(
            "You cannot apply to your own job posting".to_string(),
        ));
    }

    let application = repo
        .insert_application(&NewApplication {
            job_id,
            applicant_id,
            cover_letter: non_blank(input.cover_letter),
            resume_url: non_blank(input.resume_url),
        })
        .await?
        .ok_or_else(|| AppError::Validation("You have already applied to this job".to_string()))?;
    info!(application_id = %application.id, %job_id, %applicant_id, "Application submitted");
    Ok(application)
}

pub async fn update_application_status(
    repo: &dyn JobRepository,
    employer_id: Uuid,
    application_id: Uuid,
    status: &str,
) -> Result<JobApplicationRow, AppError> {
    if !APPLICATION_STATUSES.contains(&status) {
        return Err(AppError::Validation(format!(
            "status must be one of: {}",
            APPLICATION_STATUSES.join(", ")
        )));
    }
    repo.set_application_status(application_id, employer_id, status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {application_id} not found")))
}
