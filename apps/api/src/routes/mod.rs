pub mod health;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::dashboard::handlers as dashboard;
use crate::jobs::handlers as jobs;
use crate::quiz::handlers as quiz;
use crate::roles::handlers as roles;
use crate::session::handlers as session;
use crate::state::AppState;
use crate::tasks::handlers as tasks;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route("/api/v1/auth/sign-in", get(session::handle_sign_in))
        .route("/api/v1/auth/sign-out", post(session::handle_sign_out))
        .route("/api/v1/session", get(session::handle_get_session))
        // Role resolution
        .route("/api/v1/roles/resolve", get(roles::handle_resolve))
        .route("/api/v1/roles", post(roles::handle_select_role))
        // Onboarding tasks
        .route("/api/v1/tasks", get(tasks::handle_list_tasks))
        .route("/api/v1/tasks/:task_id", put(tasks::handle_set_completion))
        .route(
            "/api/v1/tasks/:task_id/document",
            post(tasks::handle_upload_document),
        )
        .route("/api/v1/quizzes/:quiz_id", get(quiz::handle_get_quiz))
        .route(
            "/api/v1/quizzes/:quiz_id/submit",
            post(quiz::handle_submit_quiz),
        )
        // Jobs and applications
        .route("/api/v1/companies", get(jobs::handle_list_companies))
        .route(
            "/api/v1/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route("/api/v1/jobs/:id", put(jobs::handle_update_job))
        .route("/api/v1/jobs/:id/apply", post(jobs::handle_apply))
        .route("/api/v1/applications", get(jobs::handle_list_applications))
        .route(
            "/api/v1/applications/:id/status",
            patch(jobs::handle_update_application_status),
        )
        // Dashboards
        .route(
            "/api/v1/dashboard/employer",
            get(dashboard::handle_employer_dashboard),
        )
        .route(
            "/api/v1/dashboard/employee",
            get(dashboard::handle_employee_dashboard),
        )
        .with_state(state)
}
