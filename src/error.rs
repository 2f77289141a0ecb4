//! Error types for CinderKV
//!
//! Provides a unified error type for all fallible operations. Absence of a
//! key or the end of a log is never an error; those come back as `None` or
//! `false`.

use thiserror::Error;

/// Result type alias using CinderError
pub type Result<T> = std::result::Result<T, CinderError>;

/// Unified error type for CinderKV operations
#[derive(Debug, Error)]
pub enum CinderError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    #[error("Corruption: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Lookup / Argument Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Corruption,
    NotSupported,
    InvalidArgument,
    Io,
}

impl CinderError {
    /// Shorthand for building a corruption error
    pub fn corruption(reason: impl Into<String>) -> Self {
        CinderError::Corruption(reason.into())
    }

    /// Classify this error
    ///
    /// A payload that fails to decode is a corruption of the log, and a bad
    /// configuration is an invalid argument.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CinderError::Io(_) => ErrorKind::Io,
            CinderError::Corruption(_) | CinderError::Serialization(_) => ErrorKind::Corruption,
            CinderError::NotFound(_) => ErrorKind::NotFound,
            CinderError::NotSupported(_) => ErrorKind::NotSupported,
            CinderError::InvalidArgument(_) | CinderError::Config(_) => {
                ErrorKind::InvalidArgument
            }
        }
    }

    /// True if this is a log/data corruption
    pub fn is_corruption(&self) -> bool {
        self.kind() == ErrorKind::Corruption
    }
}

impl From<bincode::Error> for CinderError {
    fn from(err: bincode::Error) -> Self {
        CinderError::Serialization(err.to_string())
    }
}
