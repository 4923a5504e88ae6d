use thiserror::Error;

/// Core error types for kubeteach resources
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid task state: {0}")]
    InvalidTaskState(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid resource data: {message}")]
    InvalidResource { message: String },
}

impl CoreError {
    /// Create a new InvalidTaskState error
    pub fn invalid_task_state(state: impl Into<String>) -> Self {
        Self::InvalidTaskState(state.into())
    }

    /// Create a new InvalidKey error
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    /// Create a new InvalidResource error
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }
}

/// Result type alias for kubeteach core operations
pub type Result<T> = std::result::Result<T, CoreError>;
