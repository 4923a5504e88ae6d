//! Errors returned by object store backends.

/// Errors that can occur during store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {kind}/{namespace}/{name}")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The version token sent with a write did not match the stored one.
    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: String, actual: String },

    #[error("Object already exists: {kind}/{namespace}/{name}")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The object is malformed, does not decode, or declares something the
    /// controller cannot act on.
    #[error("Invalid object: {message}")]
    InvalidObject { message: String },

    /// The backend could not be reached.
    #[error("Connection error: {message}")]
    ConnectionError { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn version_conflict(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::VersionConflict {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    #[must_use]
    pub fn already_exists(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn invalid_object(message: impl Into<String>) -> Self {
        Self::InvalidObject {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` when repeating the call later may succeed.
    ///
    /// A missing object may be created in the meantime; an invalid one stays
    /// invalid until someone edits it.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidObject { .. })
    }
}

impl From<kubeteach_core::CoreError> for StorageError {
    fn from(err: kubeteach_core::CoreError) -> Self {
        Self::invalid_object(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("TaskDefinition", "default", "a");
        assert_eq!(err.to_string(), "Object not found: TaskDefinition/default/a");

        let err = StorageError::version_conflict("1", "2");
        assert_eq!(err.to_string(), "Version conflict: expected 1, found 2");

        let err = StorageError::already_exists("TaskDefinition", "default", "a");
        assert_eq!(
            err.to_string(),
            "Object already exists: TaskDefinition/default/a"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(StorageError::not_found("K", "ns", "n").is_not_found());
        assert!(StorageError::version_conflict("1", "2").is_version_conflict());
        assert!(StorageError::already_exists("K", "ns", "n").is_already_exists());
        assert!(!StorageError::connection_error("refused").is_not_found());
    }

    #[test]
    fn test_retryable() {
        assert!(StorageError::version_conflict("1", "2").is_retryable());
        assert!(StorageError::connection_error("refused").is_retryable());
        assert!(StorageError::not_found("K", "ns", "n").is_retryable());
        assert!(!StorageError::invalid_object("bad").is_retryable());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: StorageError = kubeteach_core::CoreError::invalid_resource("no uid").into();
        assert!(matches!(err, StorageError::InvalidObject { .. }));
    }
}
