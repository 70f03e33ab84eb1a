use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{ProfileRow, Role};
use crate::session::SessionUser;

#[derive(Debug, Error)]
pub enum ProfileError {
    /// No profile row exists yet. Expected for new users and never fatal.
    #[error("profile not found")]
    NotFound,

    #[error("profile store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<ProfileError> for AppError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::NotFound => AppError::NotFound("Profile not found".to_string()),
            ProfileError::Store(e) => AppError::Database(e),
        }
    }
}

/// Profile collaborator used by role resolution.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<ProfileRow, ProfileError>;

    /// Creates an empty (unselected) profile for a newly signed-in user. Existing rows are untouched.
    async fn ensure_profile(&self, user: &SessionUser) -> Result<(), ProfileError>;

    /// Persists `{role, role_selected = true}`, creating the profile if absent.
    async fn select_role(&self, user_id: Uuid, role: Role) -> Result<ProfileRow, ProfileError>;
}

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<ProfileRow, ProfileError> {
        sqlx::query_as::<_, ProfileRow>("SELECT id, role, role_selected FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ProfileError::NotFound)
    }

    async fn ensure_profile(&self, user: &SessionUser) -> Result<(), ProfileError> {
        let full_name = ["full_name", "name"]
            .iter()
            .find_map(|key| user.metadata.get(*key).and_then(|v| v.as_str()));
        sqlx::query(
            "INSERT INTO profiles (id, email, full_name) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(full_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn select_role(&self, user_id: Uuid, role: Role) -> Result<ProfileRow, ProfileError> {
        Ok(sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (id, role, role_selected)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (id) DO UPDATE
                SET role = EXCLUDED.role, role_selected = TRUE, updated_at = NOW()
            RETURNING id, role, role_selected
            "#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?)
    }
}
