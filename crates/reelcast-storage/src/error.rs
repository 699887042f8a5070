//! Hosting errors.
//!
//! Provider failures carry the provider they came from so a failover attempt can report
//! both causes. [`HostingError::is_failover_eligible`] decides whether an upload may be
//! retried on the fallback provider.

use reelcast_core::{AppError, HostingProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostingError {
    #[error("{provider} quota exceeded: {message}")]
    QuotaExceeded {
        provider: HostingProvider,
        message: String,
    },

    #[error("{provider} authentication failed: {message}")]
    AuthenticationFailed {
        provider: HostingProvider,
        message: String,
    },

    #[error("{provider} upload failed: {message}")]
    UploadFailed {
        provider: HostingProvider,
        message: String,
    },

    #[error("{provider} transport error: {message}")]
    Transport {
        provider: HostingProvider,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed on primary ({primary}) and fallback ({fallback})")]
    FailoverExhausted {
        primary: Box<HostingError>,
        fallback: Box<HostingError>,
    },
}

pub type HostingResult<T> = Result<T, HostingError>;

impl HostingError {
    /// Provider-side failures that another provider might not share.
    pub fn is_failover_eligible(&self) -> bool {
        matches!(
            self,
            HostingError::QuotaExceeded { .. }
                | HostingError::AuthenticationFailed { .. }
                | HostingError::UploadFailed { .. }
                | HostingError::Transport { .. }
        )
    }

    /// Short machine-readable code for logs and CLI output.
    pub fn error_code(&self) -> &'static str {
        match self {
            HostingError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            HostingError::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            HostingError::UploadFailed { .. } => "UPLOAD_FAILED",
            HostingError::Transport { .. } => "TRANSPORT_ERROR",
            HostingError::InvalidInput(_) => "INVALID_INPUT",
            HostingError::NotFound(_) => "NOT_FOUND",
            HostingError::InvalidKey(_) => "INVALID_KEY",
            HostingError::Config(_) => "CONFIG_ERROR",
            HostingError::Unsupported(_) => "UNSUPPORTED",
            HostingError::Io(_) => "IO_ERROR",
            HostingError::FailoverExhausted { .. } => "FAILOVER_EXHAUSTED",
        }
    }
}

impl From<HostingError> for AppError {
    fn from(err: HostingError) -> Self {
        match err {
            HostingError::InvalidInput(message) => AppError::InvalidInput(message),
            HostingError::NotFound(what) => AppError::NotFound(what),
            HostingError::InvalidKey(key) => AppError::InvalidInput(format!("Invalid key: {}", key)),
            HostingError::Config(message) => AppError::Config(message),
            other => AppError::UploadFailed(other.to_string()),
        }
    }
}
