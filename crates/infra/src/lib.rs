//! Infrastructure layer: backup registries, scheduling and execution.

pub mod backups;
