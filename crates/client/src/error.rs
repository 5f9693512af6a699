//! Error types for storage and authentication operations.

use thiserror::Error;

/// Errors that can occur while talking to Keystone, Swift, or Orthanc.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The token was rejected (HTTP 401). Kept distinct from other HTTP
    /// failures so callers can tell expiry apart from a generic error.
    #[error("Unauthorized: token rejected or credentials invalid")]
    Unauthorized,

    /// Object or container does not exist.
    #[error("Not found: {container}/{object}")]
    NotFound { container: String, object: String },

    /// The backend reported a conflict (HTTP 409): container already exists
    /// on create, or still holds objects on delete.
    #[error("Conflict on container '{container}': {message}")]
    Conflict { container: String, message: String },

    /// Any other non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// Connection-level failure (DNS, refused, timeout).
    #[error("Network error: {message}")]
    Network { message: String, retryable: bool },

    /// Local I/O error while reading an upload source or writing a download.
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },

    /// Invalid configuration (bad URL, missing endpoint in the catalog).
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ClientError {
    /// Check if this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub(crate) fn from_io(path: impl Into<String>, err: std::io::Error) -> Self {
        ClientError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network {
            message: err.to_string(),
            retryable: err.is_timeout() || err.is_connect(),
        }
    }
}
