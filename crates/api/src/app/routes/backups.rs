use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

use strongbox_core::BackupId;

use crate::app::dto::{AcceptedResponse, BackupResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Headers accepted as the explicit "yes, start a backup" confirmation.
pub const CONFIRM_HEADERS: [&str; 2] = ["x-confirm", "confirm"];

/// True if any confirmation header carries `true` (case-insensitive).
pub fn confirm_header_present(headers: &HeaderMap) -> bool {
    CONFIRM_HEADERS.iter().any(|name| {
        headers.get_all(*name).iter().any(|value| {
            value
                .to_str()
                .is_ok_and(|v| v.trim().eq_ignore_ascii_case("true"))
        })
    })
}

pub async fn schedule_backup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
) -> axum::response::Response {
    let confirmed = confirm_header_present(&headers);

    match services
        .backups
        .schedule_backup(principal.principal(), confirmed)
    {
        Ok(accepted) => (
            StatusCode::ACCEPTED,
            [
                (header::LOCATION, accepted.location.clone()),
                (header::RETRY_AFTER, accepted.retry_after.as_secs().to_string()),
            ],
            Json(AcceptedResponse::from(&accepted)),
        )
            .into_response(),
        Err(rejection) => errors::schedule_rejection_to_response(rejection),
    }
}

pub async fn get_backup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = services.backups.authorize(principal.principal()) {
        return errors::forbidden(e);
    }

    // Ids that cannot exist are reported like unknown ones.
    let id: BackupId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("backup '{id}' not found"),
            );
        }
    };

    match services.backups.get_backup(id) {
        Ok(record) => Json(BackupResponse::from(&record)).into_response(),
        Err(e) => errors::lookup_error_to_response(e),
    }
}
