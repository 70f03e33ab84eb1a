use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::job::{
    ApplicationView, CompanyRow, JobApplicationRow, JobOpeningRow, JobWithApplicationCount,
};

/// Editable job posting fields, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFields {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub salary_range: Option<String>,
    pub status: String,
}

/// Where a new posting's application link comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum JobLink {
    /// Stored as given, possibly empty.
    Provided(Option<String>),
    /// Derived from the new row's id once it exists.
    Generated { base: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub company_id: Uuid,
    pub employer_id: Uuid,
    pub fields: JobFields,
    pub link: JobLink,
}

pub fn application_link_for(link_base: &str, job_id: Uuid) -> String {
    format!("{}/jobs/{}/apply", link_base.trim_end_matches('/'), job_id)
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job_id: Uuid,
    pub applicant_id: Uuid,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
}

/// Job/application store collaborator.
///
/// A job belongs to whoever owns its company; every employer-scoped read and
/// write below applies that rule.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn list_companies(&self, owner_id: Uuid) -> Result<Vec<CompanyRow>, sqlx::Error>;
    async fn company_owned_by(&self, company_id: Uuid, owner_id: Uuid) -> Result<bool, sqlx::Error>;
    /// Inserts the posting. A [`JobLink::Generated`] link is written by a
    /// second statement in the same transaction, so the row never persists
    /// without it.
    async fn create_job(&self, job: &NewJob) -> Result<JobOpeningRow, sqlx::Error>;
    /// `None` when the job does not exist or belongs to another employer.
    async fn update_job(
        &self,
        job_id: Uuid,
        employer_id: Uuid,
        fields: &JobFields,
    ) -> Result<Option<JobOpeningRow>, sqlx::Error>;
    async fn job_by_id(&self, job_id: Uuid) -> Result<Option<JobOpeningRow>, sqlx::Error>;
    async fn jobs_with_counts(
        &self,
        employer_id: Uuid,
    ) -> Result<Vec<JobWithApplicationCount>, sqlx::Error>;
    async fn applications_for_jobs(
        &self,
        job_ids: &[Uuid],
    ) -> Result<Vec<ApplicationView>, sqlx::Error>;
    async fn applications_for_applicant(
        &self,
        applicant_id: Uuid,
    ) -> Result<Vec<ApplicationView>, sqlx::Error>;
    /// `None` when the applicant already applied to this job.
    async fn insert_application(
        &self,
        application: &NewApplication,
    ) -> Result<Option<JobApplicationRow>, sqlx::Error>;
    /// `None` when the application does not exist or its job belongs to another employer.
    async fn set_application_status(
        &self,
        application_id: Uuid,
        employer_id: Uuid,
        status: &str,
    ) -> Result<Option<JobApplicationRow>, sqlx::Error>;
}

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const APPLICATION_VIEW_SELECT: &str = r#"
    SELECT a.id, a.job_id, j.title AS job_title, c.name AS company_name,
           a.applicant_id, p.email AS applicant_email, p.full_name AS applicant_name,
           a.status, a.created_at
    FROM job_applications a
    JOIN job_openings j ON j.id = a.job_id
    JOIN companies c ON c.id = j.company_id
    LEFT JOIN profiles p ON p.id = a.applicant_id
"#;

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn list_companies(&self, owner_id: Uuid) -> Result<Vec<CompanyRow>, sqlx::Error> {
        sqlx::query_as::<_, CompanyRow>(
            "SELECT id, owner_id, name, created_at FROM companies WHERE owner_id = $1 ORDER BY name",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn company_owned_by(&self, company_id: Uuid, owner_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM companies WHERE id = $1 AND owner_id = $2)",
        )
        .bind(company_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_job(&self, job: &NewJob) -> Result<JobOpeningRow, sqlx::Error> {
        let provided = match &job.link {
            JobLink::Provided(link) => link.as_deref(),
            JobLink::Generated { .. } => None,
        };

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, JobOpeningRow>(
            r#"
            INSERT INTO job_openings
                (company_id, employer_id, title, description, location,
                 employment_type, salary_range, status, application_link)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(job.company_id)
        .bind(job.employer_id)
        .bind(&job.fields.title)
        .bind(&job.fields.description)
        .bind(&job.fields.location)
        .bind(&job.fields.employment_type)
        .bind(&job.fields.salary_range)
        .bind(&job.fields.status)
        .bind(provided)
        .fetch_one(&mut *tx)
        .await?;

        let row = match &job.link {
            JobLink::Generated { base } => {
                sqlx::query_as::<_, JobOpeningRow>(
                    "UPDATE job_openings SET application_link = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
                )
                .bind(application_link_for(base, row.id))
                .bind(row.id)
                .fetch_one(&mut *tx)
                .await?
            }
            JobLink::Provided(_) => row,
        };
        tx.commit().await?;
        Ok(row)
    }

    async fn update_job(
        &self,
        job_id: Uuid,
        employer_id: Uuid,
        fields: &JobFields,
    ) -> Result<Option<JobOpeningRow>, sqlx::Error> {
        sqlx::query_as::<_, JobOpeningRow>(
            r#"
            UPDATE job_openings
            SET title = $1, description = $2, location = $3, employment_type = $4,
                salary_range = $5, status = $6, updated_at = NOW()
            WHERE id = $7
              AND company_id IN (SELECT id FROM companies WHERE owner_id = $8)
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.location)
        .bind(&fields.employment_type)
        .bind(&fields.salary_range)
        .bind(&fields.status)
        .bind(job_id)
        .bind(employer_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn job_by_id(&self, job_id: Uuid) -> Result<Option<JobOpeningRow>, sqlx::Error> {
        sqlx::query_as::<_, JobOpeningRow>("SELECT * FROM job_openings WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn jobs_with_counts(
        &self,
        employer_id: Uuid,
    ) -> Result<Vec<JobWithApplicationCount>, sqlx::Error> {
        sqlx::query_as::<_, JobWithApplicationCount>(
            r#"
            SELECT j.id, j.company_id, c.name AS company_name, j.title, j.status,
                   j.location, j.application_link,
                   COUNT(a.id) AS application_count, j.created_at
            FROM job_openings j
            JOIN companies c ON c.id = j.company_id
            LEFT JOIN job_applications a ON a.job_id = j.id
            WHERE c.owner_id = $1
            GROUP BY j.id, c.name
            ORDER BY j.created_at DESC
            "#,
        )
        .bind(employer_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn applications_for_jobs(
        &self,
        job_ids: &[Uuid],
    ) -> Result<Vec<ApplicationView>, sqlx::Error> {
        let query = format!("{APPLICATION_VIEW_SELECT} WHERE a.job_id = ANY($1) ORDER BY a.created_at DESC");
        sqlx::query_as::<_, ApplicationView>(&query)
            .bind(job_ids)
            .fetch_all(&self.pool)
            .await
    }

    async fn applications_for_applicant(
        &self,
        applicant_id: Uuid,
    ) -> Result<Vec<ApplicationView>, sqlx::Error> {
        let query = format!(
            "{APPLICATION_VIEW_SELECT} WHERE a.applicant_id = $1 ORDER BY a.created_at DESC"
        );
        sqlx::query_as::<_, ApplicationView>(&query)
            .bind(applicant_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn insert_application(
        &self,
        application: &NewApplication,
    ) -> Result<Option<JobApplicationRow>, sqlx::Error> {
        sqlx::query_as::<_, JobApplicationRow>(
            r#"
            INSERT INTO job_applications (job_id, applicant_id, status, cover_letter, resume_url)
            VALUES ($1, $2, 'pending', $3, $4)
            ON CONFLICT (job_id, applicant_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(application.job_id)
        .bind(application.applicant_id)
        .bind(&application.cover_letter)
        .bind(&application.resume_url)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_application_status(
        &self,
        application_id: Uuid,
        employer_id: Uuid,
        status: &str,
    ) -> Result<Option<JobApplicationRow>, sqlx::Error> {
        sqlx::query_as::<_, JobApplicationRow>(
            r#"
            UPDATE job_applications a
            SET status = $1, updated_at = NOW()
            FROM job_openings j
            JOIN companies c ON c.id = j.company_id
            WHERE a.id = $2 AND j.id = a.job_id AND c.owner_id = $3
            RETURNING a.*
            "#,
        )
        .bind(status)
        .bind(application_id)
        .bind(employer_id)
        .fetch_optional(&self.pool)
        .await
    }
}
