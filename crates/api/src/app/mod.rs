//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: registry/executor/scheduler wiring from configuration
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use strongbox_auth::{Hs256JwtValidator, JwtValidator};

use crate::config::ServerConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, ServiceError};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Must run inside a Tokio runtime; backups are spawned onto it.
pub async fn build_app(config: &ServerConfig) -> Result<Router, ServiceError> {
    let services = AppServices::from_config(config, tokio::runtime::Handle::current())?;
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    Ok(build_router(services, jwt))
}

/// Router over already-built services.
pub fn build_router(services: AppServices, jwt: Arc<dyn JwtValidator>) -> Router {
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
