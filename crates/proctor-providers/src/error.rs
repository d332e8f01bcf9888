//! Provider error types.

use thiserror::Error;

/// Errors that can occur when talking to a content provider or results store.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No exam exists under the requested identifier.
    #[error("exam not found: {0}")]
    ExamNotFound(String),

    /// The identifier cannot be placed in a request path.
    #[error("invalid exam id: {0:?}")]
    InvalidExamId(String),

    /// The backend rejected the bearer credential.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedBody(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Classify a transport-level `reqwest` failure.
    pub(crate) fn from_transport(e: reqwest::Error, base_url: &str, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(timeout_secs)
        } else if e.is_connect() {
            ProviderError::NetworkError(format!("backend not reachable at {base_url}: {e}"))
        } else {
            ProviderError::NetworkError(e.to_string())
        }
    }
}
