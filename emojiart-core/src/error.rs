//! Error types for EmojiArt operations.

use thiserror::Error;

/// Result type for EmojiArt operations.
pub type ArtResult<T> = Result<T, ArtError>;

/// Errors that can occur in EmojiArt operations.
#[derive(Debug, Error)]
pub enum ArtError {
    /// Document serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted document content violates a document invariant.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Invalid palette or document operation.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Fetching a background resource failed.
    #[error("Failed to load resource: {0}")]
    ResourceLoad(String),

    /// Image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The key-value store rejected an operation.
    #[error("Store error: {0}")]
    Store(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
