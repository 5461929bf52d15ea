//! Error types for stacktop
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in stacktop
#[derive(Debug, Error)]
pub enum StackTopError {
    /// Target process could not be attached
    #[error("Could not attach to process {pid}: {reason}")]
    AttachFailed { pid: u32, reason: String },

    /// Platform support the sampler relies on is unavailable (e.g. procfs not mounted)
    #[error("Runtime support missing: {0}")]
    RuntimeMissing(String),

    /// Configuration rejected during validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A sample could not be taken or parsed
    #[error("Sample error: {0}")]
    Sample(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML config parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StackTopError {
    /// Whether the loop should end gracefully with guidance instead of failing
    pub fn is_runtime_missing(&self) -> bool {
        matches!(self, StackTopError::RuntimeMissing(_))
    }
}

/// Result type alias for stacktop operations
pub type Result<T> = std::result::Result<T, StackTopError>;
