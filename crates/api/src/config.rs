//! Server configuration, read from the environment.
//!
//! | Variable            | Default          |
//! |---------------------|------------------|
//! | `BIND_ADDR`         | `0.0.0.0:8080`   |
//! | `JWT_SECRET`        | insecure dev key |
//! | `ADMIN_ROLES`       | `admin`          |
//! | `BACKUP_STATE_FILE` | in-memory only   |
//! | `BACKUP_COMMAND`    | backups fail     |
//! | `LOG_FORMAT`        | `json`           |
//!
//! Empty values count as unset.

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

use strongbox_auth::Role;
use strongbox_observability::{LogFormat, ParseLogFormatError};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid BIND_ADDR '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: AddrParseError,
    },
    #[error("ADMIN_ROLES must name at least one role")]
    NoAdminRoles,
    #[error("invalid LOG_FORMAT: {0}")]
    InvalidLogFormat(#[from] ParseLogFormatError),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Set when `JWT_SECRET` was missing and the dev key is in use.
    pub insecure_jwt_secret: bool,
    pub admin_roles: Vec<Role>,
    pub state_file: Option<PathBuf>,
    pub backup_command: Option<String>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = match var("BIND_ADDR") {
            Some(value) => value
                .parse::<SocketAddr>()
                .map_err(|source| ConfigError::InvalidBindAddr { value, source })?,
            None => DEFAULT_BIND_ADDR
                .parse::<SocketAddr>()
                .map_err(|source| ConfigError::InvalidBindAddr {
                    value: DEFAULT_BIND_ADDR.to_string(),
                    source,
                })?,
        };

        let (jwt_secret, insecure_jwt_secret) = match var("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => (DEV_JWT_SECRET.to_string(), true),
        };

        let admin_roles = match var("ADMIN_ROLES") {
            Some(list) => Role::parse_list(&list),
            None => vec![Role::ADMIN],
        };
        if admin_roles.is_empty() {
            return Err(ConfigError::NoAdminRoles);
        }

        let log_format = match var("LOG_FORMAT") {
            Some(value) => value.parse::<LogFormat>()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            insecure_jwt_secret,
            admin_roles,
            state_file: var("BACKUP_STATE_FILE").map(PathBuf::from),
            backup_command: var("BACKUP_COMMAND"),
            log_format,
        })
    }
}
