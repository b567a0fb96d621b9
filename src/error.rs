//! Error types shared by the store, the gateway and local storage

use thiserror::Error;

/// Errors surfaced to callers of the graph engine.
///
/// Availability problems with the remote API never show up here: the
/// gateway absorbs them and replays the operation against local state.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Duplicate identity, missing entity, dangling endpoint, or a 4xx
    /// answer from the remote API. The message is meant for the user.
    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GraphError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GraphError::Validation(_))
    }
}

/// Errors from the local key/value storage
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = GraphError::validation("View 7 not found");
        assert_eq!(err.to_string(), "View 7 not found");
        assert!(err.is_validation());
    }

    #[test]
    fn test_storage_error_wraps() {
        let err: GraphError = StorageError::Poisoned.into();
        assert!(!err.is_validation());
        assert!(err.to_string().contains("poisoned"));
    }
}
