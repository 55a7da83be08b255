use thiserror::Error;

/// Errors from repository operations (used by trait definitions in kindred-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by the public pipeline operations.
///
/// A provider outage during `send_message` is not an error: the user message
/// is kept and the outcome carries a failed reply instead. `ProviderUnavailable`
/// and `ProviderRejected` are returned as errors only by operations that have
/// nothing else to report, such as retrying a reply.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("AI provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("AI provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<RepositoryError> for PipelineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => PipelineError::NotFound("entity"),
            RepositoryError::Conflict(msg) => PipelineError::Conflict(msg),
            other => PipelineError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_repository_error_maps_to_pipeline_error() {
        assert!(matches!(
            PipelineError::from(RepositoryError::Connection),
            PipelineError::Storage(_)
        ));
        assert!(matches!(
            PipelineError::from(RepositoryError::NotFound),
            PipelineError::NotFound(_)
        ));
    }

    #[test]
    fn test_pipeline_error_display() {
        assert_eq!(
            PipelineError::NotFound("conversation").to_string(),
            "conversation not found"
        );
    }
}
