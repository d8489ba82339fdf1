//! Backup scheduling with single-flight admission.
//!
//! ## Design
//!
//! - At most one backup is `IN_PROGRESS` at any time; concurrent requests are
//!   rejected, not queued
//! - Admission (check + id allocation + insert) is one atomic registry call
//! - Execution is handed to a [`BackupExecutor`] on a background task
//! - The scheduler records each backup's outcome exactly once
//!
//! ## Components
//!
//! - `BackupRegistry`: id -> record store (in-memory or JSON file)
//! - `BackupScheduler`: admission + completion bookkeeping
//! - `BackupExecutor`: produces the actual backup (external command, ...)

pub mod executor;
pub mod file_registry;
pub mod registry;
pub mod scheduler;

pub use executor::{BackupExecutor, CommandBackupExecutor, UnconfiguredBackupExecutor};
pub use file_registry::FileBackupRegistry;
pub use registry::{BackupRegistry, InMemoryBackupRegistry, RegistryError};
pub use scheduler::{BackupScheduler, CompletionRetry, ScheduleError};
