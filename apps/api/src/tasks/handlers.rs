use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::tracker::{task_progress, TaskProgress};
use crate::errors::AppError;
use crate::models::task::TaskWithState;
use crate::session::extract::AuthSession;
use crate::state::AppState;
use crate::storage::{document_key, sanitize_file_name, upload_document};

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskWithState>,
    pub progress: TaskProgress,
}

#[derive(Debug, Deserialize)]
pub struct SetCompletionRequest {
    pub completed: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// GET /api/v1/tasks
pub async fn handle_list_tasks(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Json<TaskListResponse> {
    let tasks = state.tasks.load(session.user.id).await;
    let progress = task_progress(&tasks);
    Json(TaskListResponse { tasks, progress })
}

/// PUT /api/v1/tasks/:task_id
pub async fn handle_set_completion(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(task_id): Path<String>,
    Json(req): Json<SetCompletionRequest>,
) -> Result<Json<TaskWithState>, AppError> {
    let updated = state
        .tasks
        .set_completion(session.user.id, &task_id, req.completed, req.metadata)
        .await?;
    Ok(Json(updated))
}

/// POST /api/v1/tasks/:task_id/document
///
/// Stores the uploaded file and completes the task with a pointer to it.
pub async fn handle_upload_document(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(task_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<TaskWithState>, AppError> {
    let user_id = session.user.id;
    let tasks = state.tasks.load(user_id).await;
    let task = tasks
        .iter()
        .find(|t| t.task.id == task_id)
        .ok_or_else(|| AppError::NotFound(format!("Task {task_id} not found")))?;
    if !task.task.task_type.accepts_documents() {
        return Err(AppError::Validation(format!(
            "Task {task_id} does not take document uploads"
        )));
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
        .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    let file_name = sanitize_file_name(field.file_name().unwrap_or("document"));
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let body = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
    if body.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    let key = document_key(user_id, &task_id, &file_name);
    upload_document(&state.s3, &state.config.s3_bucket, &key, &content_type, body).await?;

    let mut metadata = Map::new();
    metadata.insert("s3_key".to_string(), Value::from(key));
    metadata.insert("file_name".to_string(), Value::from(file_name));
    metadata.insert("content_type".to_string(), Value::from(content_type));
    let updated = state
        .tasks
        .set_completion(user_id, &task_id, true, metadata)
        .await?;
    Ok(Json(updated))
}
