// Error types for fooddash.
// Covers transport failures, HTTP status errors, client-side validation and storage errors.

use std::fmt;

use thiserror::Error;

use crate::forms::ValidationError;

#[derive(Error, Debug)]
pub enum FoodDashError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Query failed: {0}")]
    Query(ErrorInfo),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl FoodDashError {
    /// HTTP status code associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FoodDashError::Network(err) => err.status().map(|s| s.as_u16()),
            FoodDashError::Unauthorized => Some(401),
            FoodDashError::NotFound(_) => Some(404),
            FoodDashError::Http { status, .. } => Some(*status),
            FoodDashError::Query(info) => info.status,
            _ => None,
        }
    }

    /// Whether this error came from the transport (connectivity or non-2xx response).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FoodDashError::Network(_)
                | FoodDashError::Unauthorized
                | FoodDashError::NotFound(_)
                | FoodDashError::Http { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FoodDashError>;

/// Clonable summary of a failed fetch, kept on cache entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub status: Option<u16>,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<&FoodDashError> for ErrorInfo {
    fn from(err: &FoodDashError) -> Self {
        match err {
            // Already a summary; don't wrap it twice.
            FoodDashError::Query(info) => info.clone(),
            other => Self::new(other.status(), other.to_string()),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => f.write_str(&self.message),
        }
    }
}
