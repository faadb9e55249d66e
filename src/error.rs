//! Error types for the minid client

use thiserror::Error;

use std::path::PathBuf;

/// Result type for minid operations
pub type Result<T> = std::result::Result<T, MinidError>;

/// Minid client errors
#[derive(Error, Debug)]
pub enum MinidError {
    #[error("Identifier \"{0}\" is not supported by Minid")]
    UnknownIdentifier(String),

    #[error("Identifier type \"{0}\" is not supported by Minid")]
    UnknownIdentifierType(String),

    #[error("Authentication required, please login and try again")]
    LoginRequired,

    #[error("Identifier service returned {status}: {message}")]
    Registry { status: u16, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Algorithm {0} is not available")]
    UnsupportedAlgorithm(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Directories are not supported by Minid: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Batch cancelled after {completed} entries")]
    Cancelled { completed: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse classification used by front ends to pick exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthRequired,
    NotFound,
    Validation,
    Service,
    Cancelled,
    Other,
}

impl MinidError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MinidError::LoginRequired => ErrorKind::AuthRequired,
            MinidError::Registry { status: 401 | 403, .. } => ErrorKind::AuthRequired,
            MinidError::Registry { status: 404, .. } | MinidError::FileNotFound(_) => {
                ErrorKind::NotFound
            }
            MinidError::Registry { .. } | MinidError::Http(_) => ErrorKind::Service,
            MinidError::UnknownIdentifier(_)
            | MinidError::UnknownIdentifierType(_)
            | MinidError::Validation(_)
            | MinidError::UnsupportedAlgorithm(_)
            | MinidError::NotAFile(_)
            | MinidError::Config(_) => ErrorKind::Validation,
            MinidError::Cancelled { .. } => ErrorKind::Cancelled,
            MinidError::Io(_) | MinidError::Json(_) => ErrorKind::Other,
        }
    }

    /// Process exit code for this error (0 is reserved for success)
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Validation => 2,
            ErrorKind::AuthRequired => 3,
            ErrorKind::NotFound => 4,
            ErrorKind::Cancelled => 130,
            ErrorKind::Service | ErrorKind::Other => 1,
        }
    }
}

impl From<config_crate::ConfigError> for MinidError {
    fn from(e: config_crate::ConfigError) -> Self {
        MinidError::Config(e.to_string())
    }
}
