//! Error types for the intake client
//!
//! Validation problems are not errors: they are returned as [`Rejection`](crate::upload::Rejection)
//! data and shown to the user. Everything here aborts the operation it happened in.

use crate::upload::Category;
use thiserror::Error;

/// Result type alias for intake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the intake client
#[derive(Debug, Error)]
pub enum Error {
    /// Server answered with a non-success HTTP status
    #[error("server returned HTTP {status}")]
    Transport {
        /// The HTTP status code returned by the server
        status: u16,
    },

    /// Connection-level failure (refused, reset, timed out, unreadable body)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTTP success but the body carried `success: false`
    #[error("{0}")]
    ServerRejection(String),

    /// Upload for this category was cancelled before all batches were sent
    #[error("{0} upload cancelled")]
    Cancelled(Category),

    /// I/O error while reading a file or the session store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session store or response body could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },
}

impl Error {
    /// Short helper for configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

/// Classifies errors as transient (worth another attempt) or permanent
pub trait IsRetryable {
    /// Returns true if the operation may succeed when repeated unchanged
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Only failures where the request may never have reached the server
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            // A status or a rejection is the server's answer; repeating it changes nothing
            Error::Transport { .. } | Error::ServerRejection(_) => false,
            Error::Cancelled(_) => false,
            Error::Io(_) | Error::Serialization(_) | Error::Config { .. } => false,
        }
    }
}
