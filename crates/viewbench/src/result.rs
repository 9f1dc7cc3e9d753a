//! Result and error types for Viewbench.

use std::fmt::Display;
use thiserror::Error;

/// Result type for Viewbench operations
pub type ViewbenchResult<T> = Result<T, ViewbenchError>;

/// Errors that can occur in Viewbench
#[derive(Debug, Error)]
pub enum ViewbenchError {
    /// A wait gave up before its predicate became true
    #[error("Timed out waiting for {purpose}")]
    Timeout {
        /// Purpose label of the wait
        purpose: String,
        /// Time spent waiting in milliseconds
        elapsed_ms: u64,
        /// The application context went away mid-wait
        abandoned: bool,
    },

    /// Subject, host or hook failure raised during per-test setup
    #[error("Setup failed: {message}")]
    Setup {
        /// Error message
        message: String,
    },

    /// Failure captured on a background thread and reported on the UI thread
    #[error("An async exception occurred: {details}")]
    AsyncFailure {
        /// Description of the captured failure
        details: String,
    },

    /// Lifecycle operation called in the wrong state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewbenchError {
    /// Wrap any displayable failure as a setup error.
    pub fn setup(err: impl Display) -> Self {
        Self::Setup {
            message: err.to_string(),
        }
    }

    /// Whether this is a wait timeout (including abandoned waits).
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Purpose label carried by a timeout, if any.
    #[must_use]
    pub fn timeout_purpose(&self) -> Option<&str> {
        match self {
            Self::Timeout { purpose, .. } => Some(purpose),
            _ => None,
        }
    }
}
