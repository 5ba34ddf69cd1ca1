//! Service error type
//!
//! Every failure surfaced by the engine falls into one of four classes so
//! transport layers can map it without inspecting messages.

use crate::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Malformed identifiers, missing fields, empty stage sets
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown user, pipeline or stage
    #[error("{0} not found")]
    NotFound(String),

    /// Operation not allowed in the current state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence failure or broken invariant
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            OrchestratorError::NotFound(_) => ErrorKind::NotFound,
            OrchestratorError::Conflict(_) => ErrorKind::Conflict,
            OrchestratorError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl From<RepositoryError> for OrchestratorError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => OrchestratorError::NotFound(what),
            RepositoryError::Conflict(msg) => OrchestratorError::Conflict(msg),
            RepositoryError::Database(err) => OrchestratorError::Internal(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_keep_their_class() {
        let not_found: OrchestratorError = RepositoryError::NotFound("pipeline 1".into()).into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(not_found.to_string(), "pipeline 1 not found");

        let conflict: OrchestratorError = RepositoryError::Conflict("taken".into()).into();
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let internal: OrchestratorError =
            RepositoryError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(internal.kind(), ErrorKind::Internal);
    }
}
