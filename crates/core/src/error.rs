//! Error types for document text extraction and injection.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting or injecting document text.
///
/// Problems with individual location keys are never errors; they end up in
/// an [`InjectReport`](crate::InjectReport) instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read the input file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// A part required to interpret the container is absent.
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// Invalid or corrupted file.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or serialization error.
    #[error("XML error: {0}")]
    XmlError(String),

    /// A translation chunk could not be decoded.
    #[error("Invalid translation chunk '{0}': {1}")]
    InvalidChunk(String, String),

    /// The persisted deduplication reverse map could not be decoded.
    #[error("Invalid dedup mapping: {0}")]
    InvalidMapping(String),
}
