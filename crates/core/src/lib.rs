//! `strongbox-core` — backup domain building blocks.
//!
//! This crate contains **pure domain** types (no IO, no runtime). Storage,
//! scheduling and transport live in `strongbox-infra` / `strongbox-api`.

pub mod backup;
pub mod error;
pub mod id;

pub use backup::{BackupOutcome, BackupRecord, BackupStatus};
pub use error::{DomainError, DomainResult};
pub use id::BackupId;
