use axum::{
    Router,
    routing::{get, post},
};

use crate::gateway::BACKUPS_PATH;

pub mod backups;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route(BACKUPS_PATH, post(backups::schedule_backup))
        .route(&format!("{BACKUPS_PATH}/:id"), get(backups::get_backup))
}
