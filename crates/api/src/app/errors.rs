use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::gateway::{LookupError, ScheduleRejection};

pub fn schedule_rejection_to_response(rejection: ScheduleRejection) -> axum::response::Response {
    match rejection {
        ScheduleRejection::ConfirmationRequired => json_error(
            StatusCode::BAD_REQUEST,
            "confirmation_required",
            rejection.to_string(),
        ),
        ScheduleRejection::Unauthorized(e) => forbidden(e),
        ScheduleRejection::AlreadyInProgress { .. } => {
            json_error(StatusCode::CONFLICT, "backup_in_progress", rejection.to_string())
        }
        ScheduleRejection::Internal(msg) => {
            tracing::error!(error = %msg, "backup scheduling failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

pub fn lookup_error_to_response(err: LookupError) -> axum::response::Response {
    match err {
        LookupError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        LookupError::Internal(msg) => {
            tracing::error!(error = %msg, "backup lookup failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

pub fn forbidden(err: impl std::fmt::Display) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
