use crate::context::ContextKey;
use thiserror::Error;

/// Raised when a request context is required but missing or incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Context is not initialized")]
    NotInitialized,

    #[error("Context {0} not found")]
    KeyNotFound(ContextKey),

    #[error("unknown context key: {0}")]
    UnknownKey(String),
}

pub type Result<T> = std::result::Result<T, ContextError>;
