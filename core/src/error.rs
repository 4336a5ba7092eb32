//! Error types for httpprobe-core

use thiserror::Error;
use uuid::Uuid;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, rejected at prepare. These are soft errors:
    /// the caller is expected to display the message and no engine is created.
    #[error("configuration error: {0}")]
    Config(String),

    /// No engine is registered under the given execution id
    #[error("no check registered for execution {0}")]
    UnknownExecution(Uuid),
}

impl Error {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error should be displayed to the caller rather than
    /// treated as an internal fault
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
