use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::{find_quiz, grade, PublicQuiz, QuizResult};
use crate::errors::AppError;
use crate::models::task::TaskWithState;
use crate::session::extract::AuthSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct SubmitQuizResponse {
    pub result: QuizResult,
    /// Present when the submission passed and completed the linked task.
    pub task: Option<TaskWithState>,
}

/// GET /api/v1/quizzes/:quiz_id
pub async fn handle_get_quiz(
    _session: AuthSession,
    Path(quiz_id): Path<String>,
) -> Result<Json<PublicQuiz>, AppError> {
    let quiz = find_quiz(&quiz_id)
        .ok_or_else(|| AppError::NotFound(format!("Quiz {quiz_id} not found")))?;
    Ok(Json(quiz.public_view()))
}

/// POST /api/v1/quizzes/:quiz_id/submit
pub async fn handle_submit_quiz(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(quiz_id): Path<String>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<Json<SubmitQuizResponse>, AppError> {
    let quiz = find_quiz(&quiz_id)
        .ok_or_else(|| AppError::NotFound(format!("Quiz {quiz_id} not found")))?;
    let result = grade(quiz, &req.answers)?;
    info!(
        user_id = %session.user.id,
        quiz_id = %quiz_id,
        score = result.score,
        "Quiz submitted"
    );

    let task = if result.passed {
        let mut metadata = Map::new();
        metadata.insert("quiz_id".to_string(), Value::from(quiz.id));
        metadata.insert("score".to_string(), Value::from(result.score));
        metadata.insert("passed".to_string(), Value::from(true));
        Some(
            state
                .tasks
                .set_completion(session.user.id, quiz.task_id, true, metadata)
                .await?,
        )
    } else {
        None
    };

    Ok(Json(SubmitQuizResponse { result, task }))
}
