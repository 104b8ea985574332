//! Error types for backup rotation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RotationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("[{operation}] Backup service error: {message}")]
    BackupService { operation: String, message: String },

    #[error("Rotation failed for {} of {total} table(s): {}", .failed.len(), .failed.join(", "))]
    PartialCycleFailure { failed: Vec<String>, total: usize },
}

impl RotationError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn service(operation: &str, message: impl Into<String>) -> Self {
        Self::BackupService {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}
