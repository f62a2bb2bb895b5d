//! Error types for Skylift.
//!
//! Only a primary-process spawn failure and provisioning failures are hard
//! errors; readiness and tunnel-discovery timeouts are represented as
//! negative values in their result types, never as errors.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Skylift library.
#[derive(Debug, Error)]
pub enum SkyliftError {
    /// A child process could not be started at all.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A provisioning command started but exited with a non-zero status.
    #[error("Command {program} failed with exit code {code:?}")]
    CommandFailed { program: String, code: Option<i32> },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Failed to create symlink from {src} to {dest}: {reason}")]
    SymlinkFailed {
        src: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        cause: Option<String>,
    },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    /// Operator-triggered interruption; handled by graceful teardown.
    #[error("Launch interrupted")]
    Interrupted,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Skylift operations.
pub type Result<T> = std::result::Result<T, SkyliftError>;

// Conversion implementations for common error types

impl From<std::io::Error> for SkyliftError {
    fn from(err: std::io::Error) -> Self {
        SkyliftError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SkyliftError {
    fn from(err: serde_json::Error) -> Self {
        SkyliftError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for SkyliftError {
    fn from(err: reqwest::Error) -> Self {
        SkyliftError::Network {
            message: err.to_string(),
            cause: err.url().map(|u| u.to_string()),
        }
    }
}

impl SkyliftError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        SkyliftError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether this error aborts the whole launch.
    ///
    /// A tunnel-side spawn failure is handled as a degraded launch by the
    /// sequencer before it ever reaches this check; everything that does
    /// propagate out of the library is fatal except interruption.
    pub fn is_interruption(&self) -> bool {
        matches!(self, SkyliftError::Interrupted)
    }
}
