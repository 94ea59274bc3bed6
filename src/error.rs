//! Error types for background-dl
//!
//! This module provides:
//! - [`Error`], the crate-wide error returned by fallible operations
//! - [`DatabaseError`], persistence-layer failures
//! - [`ErrorCode`], the stable failure taxonomy surfaced to the host in `failed` events
//! - [`TaskFailure`], the code + message pair carried by a `failed` event

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for background-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for background-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "persistence.namespace")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A required argument was missing or malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Task not found
    #[error("task not found: {0}")]
    NotFound(String),

    /// The download gateway rejected or failed an operation
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Stable failure taxonomy reported to the host application
///
/// The numeric and string forms never change between releases; hosts are expected
/// to switch on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Device storage is full
    StorageFull,
    /// Network failure (probe, redirect resolution, or transfer data error)
    NetworkError,
    /// Missing permission to write the destination
    PermissionDenied,
    /// Destination already exists and could not be replaced
    FileAlreadyExists,
    /// Remote resource or transfer no longer exists
    FileNotFound,
    /// The transfer cannot be resumed; terminal
    CannotResume,
    /// Too many HTTP redirects
    TooManyRedirects,
    /// HTTP status the transfer could not handle
    UnhandledResponseCode,
    /// Missing id, url or destination
    InvalidArgument,
    /// Anything else; the message carries the underlying detail
    Unknown,
}

impl ErrorCode {
    /// Numeric code carried in `failed` events
    pub fn as_i32(&self) -> i32 {
        match self {
            ErrorCode::StorageFull => 0,
            ErrorCode::NetworkError => 1,
            ErrorCode::PermissionDenied => 2,
            ErrorCode::FileNotFound => 3,
            ErrorCode::FileAlreadyExists => 4,
            ErrorCode::CannotResume => 5,
            ErrorCode::TooManyRedirects => 6,
            ErrorCode::UnhandledResponseCode => 7,
            ErrorCode::InvalidArgument => 8,
            ErrorCode::Unknown => 100,
        }
    }

    /// Convert a numeric code back; unknown values map to [`ErrorCode::Unknown`]
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => ErrorCode::StorageFull,
            1 => ErrorCode::NetworkError,
            2 => ErrorCode::PermissionDenied,
            3 => ErrorCode::FileNotFound,
            4 => ErrorCode::FileAlreadyExists,
            5 => ErrorCode::CannotResume,
            6 => ErrorCode::TooManyRedirects,
            7 => ErrorCode::UnhandledResponseCode,
            8 => ErrorCode::InvalidArgument,
            _ => ErrorCode::Unknown,
        }
    }

    /// Machine-readable string code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::StorageFull => "storage_full",
            ErrorCode::NetworkError => "network_error",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::FileAlreadyExists => "file_already_exists",
            ErrorCode::FileNotFound => "file_not_found",
            ErrorCode::CannotResume => "cannot_resume",
            ErrorCode::TooManyRedirects => "too_many_redirects",
            ErrorCode::UnhandledResponseCode => "unhandled_response_code",
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure of a single task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Stable error code
    pub code: ErrorCode,
    /// Free-text detail
    pub message: String,
}

impl TaskFailure {
    /// Create a failure from a code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&Error> for TaskFailure {
    fn from(error: &Error) -> Self {
        Self::new(error.error_code(), error.to_string())
    }
}

fn io_error_code(e: &std::io::Error) -> ErrorCode {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::StorageFull => ErrorCode::StorageFull,
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
            ErrorCode::PermissionDenied
        }
        ErrorKind::AlreadyExists => ErrorCode::FileAlreadyExists,
        ErrorKind::NotFound => ErrorCode::FileNotFound,
        _ => ErrorCode::Unknown,
    }
}

impl Error {
    /// Classify this error into the stable taxonomy
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::Network(e) => {
                if e.is_redirect() {
                    ErrorCode::TooManyRedirects
                } else if e.is_status() {
                    ErrorCode::UnhandledResponseCode
                } else {
                    ErrorCode::NetworkError
                }
            }
            Error::Io(e) => io_error_code(e),
            Error::NotFound(_) => ErrorCode::FileNotFound,
            Error::Config { .. }
            | Error::Database(_)
            | Error::Sqlx(_)
            | Error::Gateway(_)
            | Error::ShuttingDown
            | Error::Other(_) => ErrorCode::Unknown,
        }
    }
}
