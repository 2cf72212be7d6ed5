use thiserror::Error;

#[derive(Error, Debug)]
/// Errors returned by storage operations.
pub enum StorageError {
    /// Generic IO failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Write failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Key was not found.
    #[error("key not found: {0}")]
    NotFound(String),

    /// An object failed to (de)serialize.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The session was not found or had no stored history.
    #[error("session not found: {0}")]
    SessionNotFound(String),
}
