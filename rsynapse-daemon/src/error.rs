use thiserror::Error;

/// Errors the query core reports to its immediate caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("result not found: {0}")]
    ResultNotFound(String),

    #[error("action not found for result id: {result_id}, action id: {action_id}")]
    ActionNotFound { result_id: String, action_id: String },

    #[error("plugin callback failed for result id: {result_id}: {reason}")]
    CallbackFailed { result_id: String, reason: String },

    #[error("{0} parameter not found")]
    MissingParameter(&'static str),

    #[error("query timeout, query: {query}, request id: {request_id}")]
    QueryTimeout { query: String, request_id: String },

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
