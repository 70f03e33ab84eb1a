use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::task::{OnboardingTask, OnboardingTaskRow, UserTaskState};

/// Authoritative store for the task catalog and per-user completion records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Remote catalog, ordered. Empty when none is configured.
    async fn catalog(&self) -> Result<Vec<OnboardingTask>, sqlx::Error>;
    async fn user_states(&self, user_id: Uuid) -> Result<Vec<UserTaskState>, sqlx::Error>;
    async fn upsert_state(&self, state: &UserTaskState) -> Result<(), sqlx::Error>;
}

pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn catalog(&self) -> Result<Vec<OnboardingTask>, sqlx::Error> {
        let rows = sqlx::query_as::<_, OnboardingTaskRow>(
            "SELECT id, title, description, task_type, required, sort_order FROM onboarding_tasks ORDER BY sort_order",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                let task = row.into_task();
                if task.is_none() {
                    warn!("Skipping onboarding task {id} with unknown task_type");
                }
                task
            })
            .collect())
    }

    async fn user_states(&self, user_id: Uuid) -> Result<Vec<UserTaskState>, sqlx::Error> {
        sqlx::query_as::<_, UserTaskState>(
            r#"
            SELECT id, user_id, task_id, completed, completed_at, metadata, created_at, updated_at
            FROM user_task_states
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn upsert_state(&self, state: &UserTaskState) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_task_states
                (id, user_id, task_id, completed, completed_at, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, task_id) DO UPDATE
                SET completed = EXCLUDED.completed,
                    completed_at = EXCLUDED.completed_at,
                    metadata = EXCLUDED.metadata,
                    updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(state.id)
        .bind(state.user_id)
        .bind(&state.task_id)
        .bind(state.completed)
        .bind(state.completed_at)
        .bind(&state.metadata)
        .bind(state.created_at)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
