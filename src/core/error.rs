//! Error types for warming-dl library
//!
//! Every variant that can come out of a single fetch belongs to the
//! fetch-failure family; the queue never needs to tell them apart.

use std::fmt;

/// Main error type for warming-dl operations
#[derive(Debug)]
pub enum Error {
    /// Connection refused, DNS failure or timeout
    NetworkError(String),

    /// Non-success status or any other HTTP-level failure
    HttpError(String),

    /// Response body could not be decoded as text
    DecodeError(String),

    /// The background fetch task died before producing an outcome
    TaskFailed(String),

    /// File I/O error
    IoError(std::io::Error),

    /// Invalid configuration or parameters
    InvalidInput(String),
}

impl Error {
    /// Whether this error is a per-item fetch failure
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Error::NetworkError(_)
                | Error::HttpError(_)
                | Error::DecodeError(_)
                | Error::TaskFailed(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NetworkError(msg) => {
                write!(f, "Network error: {}", msg)
            }
            Error::HttpError(msg) => {
                write!(f, "HTTP error: {}", msg)
            }
            Error::DecodeError(msg) => {
                write!(f, "Decode error: {}", msg)
            }
            Error::TaskFailed(msg) => {
                write!(f, "Fetch task failed: {}", msg)
            }
            Error::IoError(err) => {
                write!(f, "I/O error: {}", err)
            }
            Error::InvalidInput(msg) => {
                write!(f, "Invalid input: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Error::NetworkError(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Error::DecodeError(err.to_string())
        } else {
            Error::HttpError(err.to_string())
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::DecodeError(format!("response body is not valid UTF-8: {err}"))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            Error::TaskFailed("fetch task was aborted".to_string())
        } else {
            Error::TaskFailed(format!("fetch task panicked: {err}"))
        }
    }
}

/// Convenience result type for warming-dl operations
pub type Result<T> = std::result::Result<T, Error>;
