//! Error taxonomy for the client and synchronizer boundary.
//!
//! Retryable kinds (`Transport`, `Server`) are consumed by the client's
//! retry loop and surface as `ExhaustedRetries` once the attempt budget is
//! spent. `Client`, `Auth` and `Validation` are terminal for the call that
//! produced them; `Validation` additionally never aborts a batch - one bad
//! record is skipped and counted, the run continues.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure (connect, timeout, DNS). Retried.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote returned a 5xx status. Retried.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Remote returned a 4xx status other than 401. Not retried.
    #[error("client error ({status}): {message}")]
    Client { status: u16, message: String },

    /// Remote signalled unauthorized and there is no credential refresh path.
    #[error("unauthorized: {0}")]
    Auth(String),

    /// All retry attempts consumed. Terminal for the call.
    #[error("request failed after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    /// Expected outcome of an existence check, not a failure.
    #[error("not found: {0}")]
    NotFound(String),

    /// Locally assembled payload is malformed. Skip the record, continue.
    #[error("invalid payload: {0}")]
    Validation(String),
}

impl ApiError {
    /// Whether the retry loop should try this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Server { .. })
    }

    /// A create racing a concurrent writer may fail with a conflict; the
    /// remote's uniqueness constraint on `code` is the idempotency boundary,
    /// so a conflict means "already exists".
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Client { status: 409, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = ApiError::Server {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = ApiError::Client {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!err.is_conflict());
    }

    #[test]
    fn conflict_is_treated_as_already_exists() {
        let err = ApiError::Client {
            status: 409,
            message: "duplicate code".to_string(),
        };
        assert!(err.is_conflict());
    }

    #[test]
    fn validation_is_terminal_for_the_record_only() {
        let err = ApiError::Validation("missing field 'code'".to_string());
        assert!(!err.is_retryable());
    }
}
