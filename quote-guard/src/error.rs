use std::sync::Arc;

/// Boxed executor failure, shared between every caller waiting on the same request
pub type SharedFailure = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the deduplicator
///
/// The type is `Clone` because a single failed execution is handed to every
/// caller that attached to it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Search parameters could not be serialized: {0}")]
    InvalidParams(Arc<serde_json::Error>),
    #[error("Executor failed: {0}")]
    ExecutorFailed(SharedFailure),
    #[error("Executor panicked")]
    ExecutorPanicked,
}

impl Error {
    /// The executor's own error, if this failure came from it
    pub fn executor_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::ExecutorFailed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidParams(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
