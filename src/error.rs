//! Error types for the quickconvert library.
//!
//! Two types describe failures at two levels:
//!
//! * [`ConvertError`] carries the full detail of a failure (paths, tool
//!   diagnostics, parse messages). Library functions return
//!   `Result<_, ConvertError>`.
//!
//! * [`ErrorKind`] is the flat, serialisable taxonomy a caller sees inside
//!   [`crate::outcome::ConversionOutcome::Failed`]. Every `ConvertError` maps
//!   to exactly one kind via [`ConvertError::kind`].
//!
//! Input-validation kinds (`MissingInput`, `MissingFormat`,
//! `UnsupportedFormat`, `InputTooLarge`) are detected before any file is
//! written. Transform kinds (`DecodeError`, `EncodeError`, `EmptyInputError`,
//! `SchemaError`) mean the input data was malformed. Neither group is ever
//! retried automatically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the quickconvert library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The submission carried no file, or an empty one.
    #[error("No file uploaded")]
    MissingInput,

    /// The submission carried no conversion format identifier.
    #[error("No conversion format specified")]
    MissingFormat,

    /// The identifier is not one of the supported `{source}-to-{target}` pairs.
    #[error("Invalid conversion format '{format}'")]
    UnsupportedFormat { format: String },

    /// The input exceeds the configured size limit.
    #[error("Input is {size} bytes, larger than the {limit}-byte limit")]
    InputTooLarge { size: u64, limit: u64 },

    // ── Transform errors ──────────────────────────────────────────────────
    /// Input bytes could not be decoded (not an image, not UTF-8 text).
    #[error("Could not decode input: {detail}")]
    Decode { detail: String },

    /// Output could not be encoded into the requested container.
    #[error("Could not encode output as {target}: {detail}")]
    Encode { target: String, detail: String },

    /// Tabular input has no lines at all.
    #[error("Empty CSV file")]
    EmptyInput,

    /// JSON input does not have the expected shape.
    #[error("Invalid JSON format: {detail}")]
    Schema { detail: String },

    // ── Delegate errors ───────────────────────────────────────────────────
    /// The office tool ran but failed.
    #[error("Office document conversion failed: {detail}")]
    ExternalTool { detail: String },

    // ── Retrieval errors ──────────────────────────────────────────────────
    /// Requested artifact was swept or never existed.
    #[error("File not found: '{file_name}'")]
    NotFound { file_name: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read, create or write a stored file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, join failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    /// The caller-facing kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::MissingInput => ErrorKind::MissingInput,
            ConvertError::MissingFormat => ErrorKind::MissingFormat,
            ConvertError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ConvertError::InputTooLarge { .. } => ErrorKind::InputTooLarge,
            ConvertError::Decode { .. } => ErrorKind::DecodeError,
            ConvertError::Encode { .. } => ErrorKind::EncodeError,
            ConvertError::EmptyInput => ErrorKind::EmptyInputError,
            ConvertError::Schema { .. } => ErrorKind::SchemaError,
            ConvertError::ExternalTool { .. } => ErrorKind::ExternalToolError,
            ConvertError::NotFound { .. } => ErrorKind::NotFound,
            ConvertError::Io { .. } | ConvertError::InvalidConfig(_) | ConvertError::Internal(_) => {
                ErrorKind::InternalError
            }
        }
    }

    /// Caller-facing message. Same as `Display` except that storage paths
    /// are left out; the full error belongs in the server log.
    pub fn summary(&self) -> String {
        match self {
            ConvertError::Io { source, .. } => format!("I/O error: {source}"),
            other => other.to_string(),
        }
    }

    /// True for errors the caller can fix by correcting the submission.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MissingInput
                | ErrorKind::MissingFormat
                | ErrorKind::UnsupportedFormat
                | ErrorKind::InputTooLarge
        )
    }
}

/// Flat failure taxonomy surfaced in [`crate::outcome::ConversionOutcome::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingInput,
    MissingFormat,
    UnsupportedFormat,
    InputTooLarge,
    DecodeError,
    EncodeError,
    EmptyInputError,
    SchemaError,
    ExternalToolError,
    InternalError,
    NotFound,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
