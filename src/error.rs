//! Error types for the supply gateway

use std::io;

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for the supply gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Supply gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (startup-fatal)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure talking to an explorer (timeout, connect
    /// failure, non-OK explorer status). Retryable by the caller.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Explorer returned a response the client cannot interpret
    /// (unparseable amount, wrong batched result count or order).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Arithmetic precondition violated while deriving supply figures
    #[error("Computation error: {0}")]
    Computation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Attach the failing query's operation and address, classifying raw
    /// HTTP failures as transport errors in the process.
    ///
    /// Applied at the explorer-client boundary so every error that leaves
    /// the client names what was being asked and of whom.
    pub(crate) fn in_query(self, operation: &str, address: &str) -> Self {
        match self {
            Self::Http(e) if e.is_timeout() => {
                Self::Transport(format!("{operation}({address}): request timed out: {e}"))
            }
            Self::Http(e) if e.is_decode() => {
                Self::Protocol(format!("{operation}({address}): malformed response: {e}"))
            }
            Self::Http(e) => Self::Transport(format!("{operation}({address}): {e}")),
            Self::Transport(msg) => Self::Transport(format!("{operation}({address}): {msg}")),
            Self::Protocol(msg) => Self::Protocol(format!("{operation}({address}): {msg}")),
            Self::Json(e) => Self::Protocol(format!("{operation}({address}): {e}")),
            other => other,
        }
    }

    /// HTTP status to report this error with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Transport(_) | Self::Protocol(_) | Self::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
