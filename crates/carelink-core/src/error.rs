//! Shared error type across carelink crates.
//!
//! Bad data is not an error here: the normalizer degrades malformed input to
//! empty fields and policy violations are ordinary `PolicyResult`s. What is
//! left is configuration problems and infrastructure failures, kept in
//! separate variants so operators can tell a broken pipe from a bad rule.

use thiserror::Error;

/// Stable error classes for logs, metrics labels and exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Input rejected before it reached the pipeline.
    BadInput,
    /// Invalid or unsupported configuration.
    Config,
    /// Filesystem or other I/O failure.
    Io,
    /// Encoding/decoding of persisted documents failed.
    Serialization,
    /// Downstream consumer reported a failure.
    Downstream,
    /// Per-message processing deadline exceeded.
    Timeout,
    /// Internal invariant broken.
    Internal,
}

impl ErrorClass {
    /// String representation used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::BadInput => "BAD_INPUT",
            ErrorClass::Config => "CONFIG",
            ErrorClass::Io => "IO",
            ErrorClass::Serialization => "SERIALIZATION",
            ErrorClass::Downstream => "DOWNSTREAM",
            ErrorClass::Timeout => "TIMEOUT",
            ErrorClass::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, CarelinkError>;

/// Unified error type used by core and pipeline.
#[derive(Debug, Error)]
pub enum CarelinkError {
    #[error("bad input: {0}")]
    BadInput(String),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u32),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("downstream: {0}")]
    Downstream(String),
    #[error("processing timed out after {0} ms")]
    Timeout(u64),
    #[error("internal: {0}")]
    Internal(String),
}

impl CarelinkError {
    /// Map the error to its stable class.
    pub fn error_class(&self) -> ErrorClass {
        match self {
            CarelinkError::BadInput(_) => ErrorClass::BadInput,
            CarelinkError::Config(_) | CarelinkError::UnsupportedVersion(_) => ErrorClass::Config,
            CarelinkError::Io(_) => ErrorClass::Io,
            CarelinkError::Serialization(_) => ErrorClass::Serialization,
            CarelinkError::Downstream(_) => ErrorClass::Downstream,
            CarelinkError::Timeout(_) => ErrorClass::Timeout,
            CarelinkError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// True for failures of the machinery itself rather than of the data.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self.error_class(),
            ErrorClass::Io | ErrorClass::Serialization | ErrorClass::Downstream | ErrorClass::Timeout
        )
    }
}

impl From<serde_json::Error> for CarelinkError {
    fn from(e: serde_json::Error) -> Self {
        CarelinkError::Serialization(e.to_string())
    }
}
