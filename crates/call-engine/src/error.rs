use thiserror::Error;

/// Call engine errors
#[derive(Error, Debug)]
pub enum CallEngineError {
    /// History file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// History contents could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CallEngineError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Result type for call engine operations
pub type Result<T> = std::result::Result<T, CallEngineError>;
