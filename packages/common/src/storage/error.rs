use thiserror::Error;

/// Errors that can occur during object storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The provided content hash is invalid.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    /// The object key cannot be mapped onto the backend.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// The object exceeds the configured size limit.
    #[error("object exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    /// The backend does not implement this operation (e.g. presigning on disk).
    #[error("operation not supported by the {0} backend")]
    Unsupported(&'static str),

    /// Any other backend failure (network, credentials, remote status).
    #[error("storage backend error: {0}")]
    Backend(String),
}
