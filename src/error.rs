//! Muninn error types

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    // Key derivation errors
    #[error("cache key derivation failed: {0}")]
    KeyDerivation(String),

    /// Upstream generation failure. Never produced by the store or the
    /// middleware themselves; this is the vehicle for
    /// [`Generator`](crate::Generator) implementations to report provider
    /// errors. The middleware propagates it unchanged and caches nothing.
    #[error("generation failed: {0}")]
    Generation(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<rusqlite::Error> for MuninnError {
    fn from(err: rusqlite::Error) -> Self {
        MuninnError::Storage(err.to_string())
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
