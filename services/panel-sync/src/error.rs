//! Error types for the panel-sync core

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur while setting up or running the sync core
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for panel-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Which failure mode produced an [`ErrorInfo`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The transport call itself could not complete (DNS, refused, blocked)
    Unreachable,
    /// A response arrived with a non-2xx status
    Http,
    /// A response arrived but its body was not the expected JSON
    Parse,
    /// No response arrived within the configured timeout
    Timeout,
    /// The request was rejected locally and never sent
    Invalid,
}

/// Normalized failure carried by state cells and request outcomes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl ErrorInfo {
    pub fn unreachable(detail: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Unreachable,
            message: format!(
                "Cannot reach backend ({detail}). Check that the backend is running and that CORS allows this origin."
            ),
            status: None,
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Http,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn parse(status: u16, detail: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Parse,
            message: format!("Invalid JSON in response: {detail}"),
            status: Some(status),
        }
    }

    pub fn timeout(after_ms: u128) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: format!("Request timed out after {after_ms} ms"),
            status: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Invalid,
            message: message.into(),
            status: None,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.kind == ErrorKind::Unreachable
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorInfo {}

impl From<SyncError> for ErrorInfo {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Unreachable(detail) => ErrorInfo::unreachable(detail),
            SyncError::Json(e) => ErrorInfo {
                kind: ErrorKind::Parse,
                message: format!("Invalid JSON: {e}"),
                status: None,
            },
            SyncError::Config(message) => ErrorInfo::invalid(message),
            SyncError::Io(e) => ErrorInfo::unreachable(e),
        }
    }
}

/// Outcome of a single backend call
pub type RequestOutcome<T> = std::result::Result<T, ErrorInfo>;
