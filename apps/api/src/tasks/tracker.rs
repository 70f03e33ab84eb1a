use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cache::{tasks_key, tasks_timestamp_key, TaskCache};
use super::catalog::default_catalog;
use super::store::TaskStore;
use crate::errors::AppError;
use crate::models::task::{OnboardingTask, TaskWithState, UserTaskState};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskProgress {
    pub total: usize,
    pub completed: usize,
    pub required_remaining: usize,
    pub percentage: u32,
}

/// `round(100 * completed / total)`, or 0 for an empty list.
pub fn progress_percentage(tasks: &[TaskWithState]) -> u32 {
    let total = tasks.len();
    if total == 0 {
        return 0;
    }
    let completed = tasks.iter().filter(|t| t.completed).count();
    (100.0 * completed as f64 / total as f64).round() as u32
}

pub fn task_progress(tasks: &[TaskWithState]) -> TaskProgress {
    TaskProgress {
        total: tasks.len(),
        completed: tasks.iter().filter(|t| t.completed).count(),
        required_remaining: tasks
            .iter()
            .filter(|t| t.task.required && !t.completed)
            .count(),
        percentage: progress_percentage(tasks),
    }
}

/// Orders the catalog and attaches each task's user state.
fn merge(mut catalog: Vec<OnboardingTask>, states: Vec<UserTaskState>) -> Vec<TaskWithState> {
    catalog.sort_by_key(|t| t.order);
    catalog
        .into_iter()
        .map(|task| {
            let user_state = states.iter().find(|s| s.task_id == task.id).cloned();
            TaskWithState {
                completed: user_state.as_ref().is_some_and(|s| s.completed),
                task,
                user_state,
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct TaskTracker {
    cache: Arc<dyn TaskCache>,
    store: Arc<dyn TaskStore>,
    freshness: Duration,
}

impl TaskTracker {
    pub fn new(cache: Arc<dyn TaskCache>, store: Arc<dyn TaskStore>, freshness: Duration) -> Self {
        Self {
            cache,
            store,
            freshness,
        }
    }

    /// Ordered task list with the user's completion flags.
    ///
    /// A cached list younger than the freshness window is returned verbatim.
    /// Otherwise the list is rebuilt from the store (falling back to the
    /// default catalog) and re-cached. Never fails: cache and store errors are
    /// logged and degrade to defaults.
    pub async fn load(&self, user_id: Uuid) -> Vec<TaskWithState> {
        self.load_at(user_id, Utc::now()).await
    }

    pub async fn load_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Vec<TaskWithState> {
        if let Some(cached) = self.read_fresh(user_id, now).await {
            debug!(%user_id, "Serving task list from cache");
            return cached;
        }

        let tasks = self.rebuild(user_id).await;
        self.write_cache(user_id, &tasks, now).await;
        tasks
    }

    pub async fn set_completion(
        &self,
        user_id: Uuid,
        task_id: &str,
        completed: bool,
        metadata: Map<String, Value>,
    ) -> Result<TaskWithState, AppError> {
        self.set_completion_at(user_id, task_id, completed, metadata, Utc::now())
            .await
    }

    /// Stamps a fresh completion record onto `task_id`, writes it through to
    /// the store and rewrites the cached list. Setting `completed = false`
    /// overwrites the record; no history is kept.
    pub async fn set_completion_at(
        &self,
        user_id: Uuid,
        task_id: &str,
        completed: bool,
        metadata: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<TaskWithState, AppError> {
        let mut tasks = self.load_at(user_id, now).await;
        let entry = tasks
            .iter_mut()
            .find(|t| t.task.id == task_id)
            .ok_or_else(|| AppError::NotFound(format!("Task {task_id} not found")))?;

        let state = UserTaskState::stamp(user_id, task_id, completed, metadata, now);
        entry.completed = completed;
        entry.user_state = Some(state.clone());
        let updated = entry.clone();

        if let Err(e) = self.store.upsert_state(&state).await {
            warn!(%user_id, task_id, "Failed to persist task state, cache only: {e}");
        }
        self.write_cache(user_id, &tasks, now).await;

        info!(%user_id, task_id, completed, "Task completion updated");
        Ok(updated)
    }

    async fn read_fresh(&self, user_id: Uuid, now: DateTime<Utc>) -> Option<Vec<TaskWithState>> {
        let written_at = match self.cache.get(&tasks_timestamp_key(user_id)).await {
            Ok(Some(raw)) => raw.parse::<i64>().ok()?,
            Ok(None) => return None,
            Err(e) => {
                warn!(%user_id, "Task cache read failed: {e}");
                return None;
            }
        };

        let age_ms = now.timestamp_millis() - written_at;
        if age_ms < 0 || age_ms >= self.freshness.num_milliseconds() {
            return None;
        }

        let raw = match self.cache.get(&tasks_key(user_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(%user_id, "Task cache read failed: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(tasks) => Some(tasks),
            Err(e) => {
                warn!(%user_id, "Discarding unreadable cached task list: {e}");
                None
            }
        }
    }

    async fn rebuild(&self, user_id: Uuid) -> Vec<TaskWithState> {
        let catalog = match self.store.catalog().await {
            Ok(catalog) if !catalog.is_empty() => catalog,
            Ok(_) => default_catalog(),
            Err(e) => {
                warn!("Task catalog unavailable, using defaults: {e}");
                default_catalog()
            }
        };
        let states = self.store.user_states(user_id).await.unwrap_or_else(|e| {
            warn!(%user_id, "Task states unavailable: {e}");
            Vec::new()
        });
        merge(catalog, states)
    }

    async fn write_cache(&self, user_id: Uuid, tasks: &[TaskWithState], now: DateTime<Utc>) {
        let serialized = match serde_json::to_string(tasks) {
            Ok(s) => s,
            Err(e) => {
                warn!(%user_id, "Could not serialize task list: {e}");
                return;
            }
        };
        let written = async {
            self.cache.set(&tasks_key(user_id), &serialized).await?;
            self.cache
                .set(
                    &tasks_timestamp_key(user_id),
                    &now.timestamp_millis().to_string(),
                )
                .await
        };
        if let Err(e) = written.await {
            warn!(%user_id, "Task cache write failed: {e}");
        }
    }
}
