//! In-memory collaborators and fixtures for unit and router tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::config::Config;
use crate::jobs::repository::{
    application_link_for, JobFields, JobLink, JobRepository, NewApplication, NewJob,
};
use crate::models::job::{
    ApplicationView, CompanyRow, JobApplicationRow, JobOpeningRow, JobWithApplicationCount,
};
use crate::models::profile::{ProfileRow, Role};
use crate::models::task::{OnboardingTask, UserTaskState};
use crate::roles::resolver::ResolverRegistry;
use crate::roles::store::{ProfileError, ProfileStore};
use crate::session::client::ProviderAuthClient;
use crate::session::{AuthClient, SessionProvider, SessionUser};
use crate::state::AppState;
use crate::tasks::cache::{CacheError, TaskCache};
use crate::tasks::store::TaskStore;
use crate::tasks::tracker::TaskTracker;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-with-enough-entropy";

/// Signs a provider-style access token expiring `ttl_secs` from now (negative for expired).
pub fn mint_token(user_id: Uuid, secret: &str, ttl_secs: i64) -> String {
    let claims = json!({
        "sub": user_id.to_string(),
        "exp": Utc::now().timestamp() + ttl_secs,
        "aud": "authenticated",
        "email": "new.hire@example.test",
        "user_metadata": { "full_name": "New Hire" }
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn test_auth_client() -> Arc<dyn AuthClient> {
    Arc::new(ProviderAuthClient::new(
        "https://auth.example.test/auth/v1",
        TEST_JWT_SECRET,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Profiles
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<Uuid, ProfileRow>>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    /// When set, lookups park until `release` is notified.
    pub hold: AtomicBool,
    pub release: Notify,
}

impl MemoryProfileStore {
    pub fn exists(&self, user_id: Uuid) -> bool {
        self.profiles.lock().unwrap().contains_key(&user_id)
    }

    pub fn put(&self, user_id: Uuid, role: Option<&str>, role_selected: bool) {
        self.profiles.lock().unwrap().insert(
            user_id,
            ProfileRow {
                id: user_id,
                role: role.map(str::to_string),
                role_selected,
            },
        );
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<ProfileRow, ProfileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProfileError::Store(sqlx::Error::PoolTimedOut));
        }
        self.profiles
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or(ProfileError::NotFound)
    }

    async fn ensure_profile(&self, user: &SessionUser) -> Result<(), ProfileError> {
        self.profiles
            .lock()
            .unwrap()
            .entry(user.id)
            .or_insert_with(|| ProfileRow {
                id: user.id,
                role: None,
                role_selected: false,
            });
        Ok(())
    }

    async fn select_role(&self, user_id: Uuid, role: Role) -> Result<ProfileRow, ProfileError> {
        self.put(user_id, Some(role.as_str()), true);
        Ok(self.profiles.lock().unwrap()[&user_id].clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tasks
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryTaskCache {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTaskCache {
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl TaskCache for MemoryTaskCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.put(key, value);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTaskStore {
    catalog: Mutex<Vec<OnboardingTask>>,
    states: Mutex<Vec<UserTaskState>>,
    pub catalog_reads: AtomicUsize,
    pub upserts: AtomicUsize,
    pub fail: AtomicBool,
}

impl MemoryTaskStore {
    pub fn set_catalog(&self, catalog: Vec<OnboardingTask>) {
        *self.catalog.lock().unwrap() = catalog;
    }

    pub fn insert_state(&self, state: UserTaskState) {
        let mut states = self.states.lock().unwrap();
        states.retain(|s| !(s.user_id == state.user_id && s.task_id == state.task_id));
        states.push(state);
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn catalog(&self) -> Result<Vec<OnboardingTask>, sqlx::Error> {
        self.catalog_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self.catalog.lock().unwrap().clone())
    }

    async fn user_states(&self, user_id: Uuid) -> Result<Vec<UserTaskState>, sqlx::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self
            .states
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_state(&self, state: &UserTaskState) -> Result<(), sqlx::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.insert_state(state.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Jobs
// ────────────────────────────────────────────────────────────────────────────

/// Writes observed by [`MemoryJobRepository`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum JobWrite {
    Insert {
        job_id: Uuid,
        application_link: Option<String>,
    },
    SetLink(Uuid, String),
    Update(Uuid),
    Apply(Uuid),
    SetStatus(Uuid, String),
}

#[derive(Default)]
struct JobTables {
    companies: Vec<CompanyRow>,
    jobs: Vec<JobOpeningRow>,
    applications: Vec<JobApplicationRow>,
    writes: Vec<JobWrite>,
}

#[derive(Default)]
pub struct MemoryJobRepository {
    tables: Mutex<JobTables>,
    /// Fails the second statement of a generated-link insert, rolling back the first.
    pub fail_link_update: AtomicBool,
}

impl JobTables {
    /// Jobs whose company is owned by `owner_id`.
    fn owned_job_ids(&self, owner_id: Uuid) -> Vec<Uuid> {
        self.jobs
            .iter()
            .filter(|j| {
                self.companies
                    .iter()
                    .any(|c| c.id == j.company_id && c.owner_id == owner_id)
            })
            .map(|j| j.id)
            .collect()
    }
}

impl MemoryJobRepository {
    pub fn add_company(&self, owner_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().companies.push(CompanyRow {
            id,
            owner_id,
            name: name.to_string(),
            created_at: Utc::now(),
        });
        id
    }

    pub fn transfer_company(&self, company_id: Uuid, new_owner: Uuid) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(company) = tables.companies.iter_mut().find(|c| c.id == company_id) {
            company.owner_id = new_owner;
        }
    }

    pub fn writes(&self) -> Vec<JobWrite> {
        self.tables.lock().unwrap().writes.clone()
    }

    fn view(tables: &JobTables, application: &JobApplicationRow) -> ApplicationView {
        let job = tables.jobs.iter().find(|j| j.id == application.job_id);
        let company = job.and_then(|j| tables.companies.iter().find(|c| c.id == j.company_id));
        ApplicationView {
            id: application.id,
            job_id: application.job_id,
            job_title: job.map(|j| j.title.clone()).unwrap_or_default(),
            company_name: company.map(|c| c.name.clone()).unwrap_or_default(),
            applicant_id: application.applicant_id,
            applicant_email: None,
            applicant_name: None,
            status: application.status.clone(),
            created_at: application.created_at,
        }
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn list_companies(&self, owner_id: Uuid) -> Result<Vec<CompanyRow>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .companies
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn company_owned_by(&self, company_id: Uuid, owner_id: Uuid) -> Result<bool, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .companies
            .iter()
            .any(|c| c.id == company_id && c.owner_id == owner_id))
    }

    async fn create_job(&self, job: &NewJob) -> Result<JobOpeningRow, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let mut row = JobOpeningRow {
            id: Uuid::new_v4(),
            company_id: job.company_id,
            employer_id: job.employer_id,
            title: job.fields.title.clone(),
            description: job.fields.description.clone(),
            location: job.fields.location.clone(),
            employment_type: job.fields.employment_type.clone(),
            salary_range: job.fields.salary_range.clone(),
            status: job.fields.status.clone(),
            application_link: match &job.link {
                JobLink::Provided(link) => link.clone(),
                JobLink::Generated { .. } => None,
            },
            created_at: now,
            updated_at: now,
        };
        let mut writes = vec![JobWrite::Insert {
            job_id: row.id,
            application_link: row.application_link.clone(),
        }];

        if let JobLink::Generated { base } = &job.link {
            if self.fail_link_update.load(Ordering::SeqCst) {
                return Err(sqlx::Error::PoolTimedOut);
            }
            let link = application_link_for(base, row.id);
            writes.push(JobWrite::SetLink(row.id, link.clone()));
            row.application_link = Some(link);
        }

        tables.jobs.push(row.clone());
        tables.writes.extend(writes);
        Ok(row)
    }

    async fn update_job(
        &self,
        job_id: Uuid,
        employer_id: Uuid,
        fields: &JobFields,
    ) -> Result<Option<JobOpeningRow>, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let owned = tables.owned_job_ids(employer_id);
        let Some(job) = tables
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && owned.contains(&j.id))
        else {
            return Ok(None);
        };
        job.title = fields.title.clone();
        job.description = fields.description.clone();
        job.location = fields.location.clone();
        job.employment_type = fields.employment_type.clone();
        job.salary_range = fields.salary_range.clone();
        job.status = fields.status.clone();
        let updated = job.clone();
        tables.writes.push(JobWrite::Update(job_id));
        Ok(Some(updated))
    }

    async fn job_by_id(&self, job_id: Uuid) -> Result<Option<JobOpeningRow>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn jobs_with_counts(
        &self,
        employer_id: Uuid,
    ) -> Result<Vec<JobWithApplicationCount>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        let owned = tables.owned_job_ids(employer_id);
        Ok(tables
            .jobs
            .iter()
            .filter(|j| owned.contains(&j.id))
            .map(|j| JobWithApplicationCount {
                id: j.id,
                company_id: j.company_id,
                company_name: tables
                    .companies
                    .iter()
                    .find(|c| c.id == j.company_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                title: j.title.clone(),
                status: j.status.clone(),
                location: j.location.clone(),
                application_link: j.application_link.clone(),
                application_count: tables
                    .applications
                    .iter()
                    .filter(|a| a.job_id == j.id)
                    .count() as i64,
                created_at: j.created_at,
            })
            .collect())
    }

    async fn applications_for_jobs(
        &self,
        job_ids: &[Uuid],
    ) -> Result<Vec<ApplicationView>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .applications
            .iter()
            .filter(|a| job_ids.contains(&a.job_id))
            .map(|a| Self::view(&tables, a))
            .collect())
    }

    async fn applications_for_applicant(
        &self,
        applicant_id: Uuid,
    ) -> Result<Vec<ApplicationView>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .applications
            .iter()
            .filter(|a| a.applicant_id == applicant_id)
            .map(|a| Self::view(&tables, a))
            .collect())
    }

    async fn insert_application(
        &self,
        application: &NewApplication,
    ) -> Result<Option<JobApplicationRow>, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let duplicate = tables
            .applications
            .iter()
            .any(|a| a.job_id == application.job_id && a.applicant_id == application.applicant_id);
        if duplicate {
            return Ok(None);
        }
        let now = Utc::now();
        let row = JobApplicationRow {
            id: Uuid::new_v4(),
            job_id: application.job_id,
            applicant_id: application.applicant_id,
            status: "pending".to_string(),
            cover_letter: application.cover_letter.clone(),
            resume_url: application.resume_url.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.applications.push(row.clone());
        tables.writes.push(JobWrite::Apply(row.id));
        Ok(Some(row))
    }

    async fn set_application_status(
        &self,
        application_id: Uuid,
        employer_id: Uuid,
        status: &str,
    ) -> Result<Option<JobApplicationRow>, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let owned_jobs = tables.owned_job_ids(employer_id);
        let Some(application) = tables
            .applications
            .iter_mut()
            .find(|a| a.id == application_id && owned_jobs.contains(&a.job_id))
        else {
            return Ok(None);
        };
        application.status = status.to_string();
        let updated = application.clone();
        tables
            .writes
            .push(JobWrite::SetStatus(application_id, status.to_string()));
        Ok(Some(updated))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// App state
// ────────────────────────────────────────────────────────────────────────────

/// Handles on the fakes behind a [`test_state`].
pub struct Fakes {
    pub profiles: Arc<MemoryProfileStore>,
    pub jobs: Arc<MemoryJobRepository>,
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/onboarding_test".to_string(),
        redis_url: "redis://localhost".to_string(),
        s3_bucket: "onboarding-test".to_string(),
        s3_endpoint: "http://localhost:9000".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        auth_url: "https://auth.example.test/auth/v1".to_string(),
        auth_jwt_secret: TEST_JWT_SECRET.to_string(),
        public_app_url: "http://localhost:3000".to_string(),
        task_cache_ttl_secs: 300,
        port: 0,
        rust_log: "debug".to_string(),
    }
}

pub fn test_state() -> (AppState, Fakes) {
    let profiles = Arc::new(MemoryProfileStore::default());
    let jobs = Arc::new(MemoryJobRepository::default());
    let s3_config = aws_sdk_s3::Config::builder()
        .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new("us-east-1"))
        .build();

    let state = AppState {
        config: test_config(),
        s3: aws_sdk_s3::Client::from_conf(s3_config),
        sessions: SessionProvider::new(test_auth_client()),
        profiles: profiles.clone(),
        resolvers: ResolverRegistry::new(profiles.clone()),
        tasks: TaskTracker::new(
            Arc::new(MemoryTaskCache::default()),
            Arc::new(MemoryTaskStore::default()),
            Duration::minutes(5),
        ),
        jobs: jobs.clone(),
    };
    (state, Fakes { profiles, jobs })
}
