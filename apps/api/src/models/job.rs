use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const JOB_STATUSES: &[&str] = &["open", "closed", "draft"];
pub const APPLICATION_STATUSES: &[&str] =
    &["pending", "reviewing", "interview", "accepted", "rejected"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobOpeningRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub employer_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub salary_range: Option<String>,
    pub status: String,
    pub application_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job row plus the aggregated number of applications it has received.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobWithApplicationCount {
    pub id: Uuid,
    pub company_id: Uuid,
    pub company_name: String,
    pub title: String,
    pub status: String,
    pub location: Option<String>,
    pub application_link: Option<String>,
    pub application_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobApplicationRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub applicant_id: Uuid,
    pub status: String,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application joined with the applicant and job display fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationView {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub company_name: String,
    pub applicant_id: Uuid,
    pub applicant_email: Option<String>,
    pub applicant_name: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
