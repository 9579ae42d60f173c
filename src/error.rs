//! Error taxonomy for the few fallible entry points. `spec.md` §7 "Error
//! handling": most of the API is defensive and silently no-ops on misuse;
//! this type exists for the handful of calls that report failure, and for
//! recording soft per-pixel rejects as statistics rather than errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("failed to initialize context: {0}")]
    InitFailed(String),

    #[error("invalid context or texture handle")]
    InvalidHandle,

    #[error("operation attempted before the context or resource is ready")]
    NotReady,

    #[error("access out of bounds: {0}")]
    OutOfBounds(String),

    #[error("unknown query parameter: {0}")]
    UnknownQuery(String),
}
