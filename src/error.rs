//! Custom error types for autopilot.
//!
//! Only conditions that stop a cycle become errors. Task failures,
//! stale market data, escalations and stagnation are all recorded as
//! state and signalled through [`crate::cycle::Decision`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Exit status when the working branch does not match the required branch.
pub const EXIT_BRANCH_GUARD: i32 = 2;

/// Exit status when another loop instance holds the project lock.
pub const EXIT_ALREADY_RUNNING: i32 = 3;

/// Exit status for invalid or unreadable configuration.
pub const EXIT_CONFIG: i32 = 7;

/// Main error type for autopilot operations
#[derive(Error, Debug)]
pub enum AutopilotError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Precondition Errors
    // =========================================================================
    /// Working branch does not match the configured branch
    #[error("Branch guard: branch must be {expected}, got: {actual}")]
    BranchGuard { expected: String, actual: String },

    /// Another loop instance holds the project lock
    #[error("Another autopilot instance is running (lock: {})", lock_path.display())]
    AlreadyRunning { lock_path: PathBuf },

    // =========================================================================
    // Document Errors
    // =========================================================================
    /// A persisted document could not be read or parsed
    #[error("Document error in {}: {message}", path.display())]
    Document { path: PathBuf, message: String },

    /// Git operation failed
    #[error("Git operation failed: {operation} - {message}")]
    Git { operation: String, message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML error wrapper
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl AutopilotError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a document error
    pub fn document(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Document {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a git error
    pub fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Check if this error was raised before the cycle touched any document
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::BranchGuard { .. } | Self::AlreadyRunning { .. }
        )
    }

    /// Check if this error should stop a `--loop` run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Git { .. })
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BranchGuard { .. } => EXIT_BRANCH_GUARD,
            Self::AlreadyRunning { .. } => EXIT_ALREADY_RUNNING,
            Self::Config { .. } | Self::InvalidConfig { .. } | Self::Toml(_) => EXIT_CONFIG,
            Self::Document { .. } | Self::Git { .. } | Self::Io(_) | Self::Json(_) => 1,
        }
    }
}

/// Type alias for autopilot results
pub type Result<T> = std::result::Result<T, AutopilotError>;
