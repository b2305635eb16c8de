//! Error types for `annforest`.
//!
//! Loading and querying fail with different enums: [`LoadError`] never leaves
//! a partially constructed handle behind, [`Error`] covers everything that
//! can go wrong against a loaded index. Error codes follow the pattern
//! `ANNF-XXX`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for `annforest` query operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while opening an index file or buffer.
///
/// Always recoverable: the caller may retry with a different path,
/// dimension or metric.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Index file does not exist (ANNF-101).
    #[error("[ANNF-101] Index file '{}' not found", .0.display())]
    NotFound(PathBuf),

    /// IO error while reading or mapping the file (ANNF-102).
    #[error("[ANNF-102] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File size is not a whole number of records for the declared
    /// dimension and metric (ANNF-103).
    #[error(
        "[ANNF-103] Index is corrupt or the dimension does not match: \
         {file_size} bytes is not a non-zero multiple of the {node_size}-byte node size"
    )]
    CorruptOrDimensionMismatch {
        /// Size of the file or buffer in bytes.
        file_size: usize,
        /// Record size implied by the declared dimension and metric.
        node_size: usize,
    },

    /// Records are well sized but their contents are inconsistent (ANNF-104).
    #[error("[ANNF-104] Invalid index header: {0}")]
    InvalidHeader(String),

    /// Declared dimension is unusable (ANNF-105).
    #[error("[ANNF-105] Invalid dimension {0}")]
    InvalidDimension(usize),
}

impl LoadError {
    /// Returns the error code (e.g., "ANNF-101").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ANNF-101",
            Self::Io(_) => "ANNF-102",
            Self::CorruptOrDimensionMismatch { .. } => "ANNF-103",
            Self::InvalidHeader(_) => "ANNF-104",
            Self::InvalidDimension(_) => "ANNF-105",
        }
    }
}

/// Errors that can occur in `annforest` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Index could not be loaded (ANNF-001).
    #[error("[ANNF-001] Load failed: {0}")]
    Load(#[from] LoadError),

    /// Item id is not below the item count (ANNF-002).
    #[error("[ANNF-002] Item {item} is out of range (index holds {size} items)")]
    OutOfRange {
        /// Requested item id.
        item: u64,
        /// Number of items in the index.
        size: usize,
    },

    /// Query vector length differs from the index dimension (ANNF-003).
    #[error("[ANNF-003] Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Index dimension.
        expected: usize,
        /// Query vector length.
        actual: usize,
    },

    /// Operation attempted on a released handle (ANNF-004).
    ///
    /// This is a programming error on the caller's side.
    #[error("[ANNF-004] Index handle used after release")]
    UseAfterRelease,

    /// Configuration error (ANNF-005).
    #[error("[ANNF-005] Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the error code (e.g., "ANNF-002").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Load(_) => "ANNF-001",
            Self::OutOfRange { .. } => "ANNF-002",
            Self::DimensionMismatch { .. } => "ANNF-003",
            Self::UseAfterRelease => "ANNF-004",
            Self::Config(_) => "ANNF-005",
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// Using a released handle is a programming error and is not.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UseAfterRelease)
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
