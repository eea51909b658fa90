use thiserror::Error;

/// Errors raised by the persistence and identity layers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Empty path or empty path segment.
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    /// An update or collection write was given something other than a JSON object.
    #[error("Expected a JSON object at {path}")]
    NotAnObject { path: String },

    /// No profile is stored for the user.
    #[error("User not found: {id}")]
    UserNotFound { id: String },

    /// A previous holder of the connection lock panicked.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
