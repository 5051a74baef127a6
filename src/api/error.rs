use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single request against one of the remote services.
///
/// Callers treat every variant the same way (log and move on), but keeping
/// them apart makes the log lines say what actually went wrong.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned status {0}")]
    Status(StatusCode),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("query aborted by server: {0}")]
    Remark(String),
}
