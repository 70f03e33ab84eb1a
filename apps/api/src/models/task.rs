use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Document,
    Upload,
    Form,
    Video,
    Quiz,
    Meeting,
}

impl TaskType {
    pub fn parse(value: &str) -> Option<TaskType> {
        match value {
            "document" => Some(TaskType::Document),
            "upload" => Some(TaskType::Upload),
            "form" => Some(TaskType::Form),
            "video" => Some(TaskType::Video),
            "quiz" => Some(TaskType::Quiz),
            "meeting" => Some(TaskType::Meeting),
            _ => None,
        }
    }

    /// Task types completed by handing in a file.
    pub fn accepts_documents(&self) -> bool {
        matches!(self, TaskType::Document | TaskType::Upload)
    }
}

/// Catalog entry. Immutable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnboardingTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub required: bool,
    pub order: i32,
}

/// Row shape of the optional remote `onboarding_tasks` catalog.
#[derive(Debug, Clone, FromRow)]
pub struct OnboardingTaskRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub task_type: String,
    pub required: bool,
    pub sort_order: i32,
}

impl OnboardingTaskRow {
    pub fn into_task(self) -> Option<OnboardingTask> {
        let task_type = TaskType::parse(&self.task_type)?;
        Some(OnboardingTask {
            id: self.id,
            title: self.title,
            description: self.description,
            task_type,
            required: self.required,
            order: self.sort_order,
        })
    }
}

/// Per-user completion record for one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct UserTaskState {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserTaskState {
    /// A fresh record with a random id. `completed_at` is only set when completing.
    pub fn stamp(
        user_id: Uuid,
        task_id: &str,
        completed: bool,
        metadata: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Self {
        UserTaskState {
            id: Uuid::new_v4(),
            user_id,
            task_id: task_id.to_string(),
            completed,
            completed_at: completed.then_some(now),
            metadata: Value::Object(metadata),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A catalog task merged with the user's completion state. This is the shape cached per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskWithState {
    #[serde(flatten)]
    pub task: OnboardingTask,
    pub completed: bool,
    pub user_state: Option<UserTaskState>,
}
