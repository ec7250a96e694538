//! Error types for the proctoring signal library.
//!
//! Only configuration problems and evidence persistence surface as `Err`.
//! Per-frame detection gaps (no face, solver failure, tiny eyes) are values
//! inside the frame report, never errors.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Evidence image encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Evidence capture could not be persisted
    #[error("Evidence error: {0}")]
    EvidenceError(String),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
