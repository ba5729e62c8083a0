//! services/timeline_api/src/error.rs
//!
//! Defines the primary error type for the timeline host service.

use crate::config::ConfigError;
use medical_timeline_core::RegistryError;

/// The primary error type for the `timeline_api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A field widget could not be registered at startup.
    #[error("Widget registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded migrations failed to apply.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
