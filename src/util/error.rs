//! Error types for the ccbi decoder.

use thiserror::Error;

/// Main error type for ccbi decoding.
///
/// Fatal variants abort the current decode with no partial graph. Unresolved
/// class names and bindings are not errors; they fall back or are skipped.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid magic bytes at start of the buffer
    #[error("Invalid ccbi file: bad magic bytes")]
    InvalidMagic,

    /// Unsupported file format version
    #[error("Unsupported ccbi version: {0}")]
    UnsupportedVersion(u64),

    /// Buffer is truncated or a read ran past its end
    #[error("Unexpected end of data at byte {offset}")]
    UnexpectedEof { offset: usize },

    /// String cache index out of bounds
    #[error("String cache index {index} out of range (count: {count})")]
    StringIndexOutOfRange { index: usize, count: usize },

    /// Invalid data structure in the stream
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// UTF-8 conversion error in a string cache entry
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }
}

/// Result type alias for ccbi operations.
pub type Result<T> = std::result::Result<T, Error>;
