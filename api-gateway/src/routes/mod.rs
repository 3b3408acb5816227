//! HTTP routes.

pub mod attendance;
pub mod classes;
pub mod departments;
pub mod health;
pub mod students;
pub mod validation;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use bams_chain::{BlockSnapshot, LedgerError};

use crate::state::SharedState;

/// Error half of every handler result.
pub type ApiError = (StatusCode, String);

/// Body returned by the soft-delete endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedResponse {
    pub message: String,
    pub blockchain_data: Vec<BlockSnapshot>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route(
            "/api/departments",
            post(departments::create_department).get(departments::list_departments),
        )
        .route(
            "/api/departments/{id}",
            get(departments::get_department)
                .put(departments::update_department)
                .delete(departments::delete_department),
        )
        .route(
            "/api/classes",
            post(classes::create_class).get(classes::list_classes),
        )
        .route(
            "/api/classes/department/{department_id}",
            get(classes::classes_by_department),
        )
        .route(
            "/api/classes/{id}",
            put(classes::update_class).delete(classes::delete_class),
        )
        .route(
            "/api/students",
            post(students::create_student).get(students::list_students),
        )
        .route(
            "/api/students/class/{class_id}",
            get(students::students_by_class),
        )
        .route(
            "/api/students/{id}",
            put(students::update_student).delete(students::delete_student),
        )
        .route("/api/attendance", post(attendance::mark_attendance))
        .route(
            "/api/attendance/student/{student_id}",
            get(attendance::attendance_by_student),
        )
        .route(
            "/api/attendance/class/{class_id}/date/{date}",
            get(attendance::attendance_by_class_and_date),
        )
        .route(
            "/api/attendance/department/{department_id}/summary",
            get(attendance::department_summary),
        )
        .route(
            "/api/validate/{department_id}",
            get(validation::validate_department),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

pub(crate) fn not_found(what: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

pub(crate) fn ledger_error(err: LedgerError) -> ApiError {
    match err {
        LedgerError::NotFound(key) => (StatusCode::NOT_FOUND, format!("no chain for {key}")),
        other => {
            tracing::error!("ledger operation failed: {other}");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}
