//! Client error classification.
//!
//! The dispatcher's retry policy is driven entirely by this split:
//! retryable failures are network-shaped (the request may succeed later),
//! terminal failures are request-shaped (retrying the same bytes cannot
//! help).

use thiserror::Error;

/// A failed delivery attempt.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network error, timeout, 429, or 5xx. Worth retrying.
    #[error("Retryable delivery failure: {0}")]
    Retryable(String),

    /// 4xx other than not-found-on-delete. Retrying cannot succeed.
    #[error("Terminal delivery failure (status {status:?}): {message}")]
    Terminal {
        status: Option<u16>,
        message: String,
    },
}

impl ClientError {
    /// Whether the dispatcher should retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Retryable(_))
    }

    /// Classify an HTTP response status for the given operation.
    ///
    /// Returns `None` for statuses that count as success: any 2xx, and 404
    /// on a delete (the downstream already lacks the document).
    pub fn from_status(status: u16, is_delete: bool, body: String) -> Option<ClientError> {
        match status {
            200..=299 => None,
            404 if is_delete => None,
            429 => Some(ClientError::Retryable(format!("HTTP 429: {}", body))),
            500..=599 => Some(ClientError::Retryable(format!("HTTP {}: {}", status, body))),
            other => Some(ClientError::Terminal {
                status: Some(other),
                message: body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses() {
        assert!(ClientError::from_status(200, false, String::new()).is_none());
        assert!(ClientError::from_status(201, false, String::new()).is_none());
    }

    #[test]
    fn test_not_found_on_delete_is_success() {
        assert!(ClientError::from_status(404, true, String::new()).is_none());
    }

    #[test]
    fn test_not_found_on_upsert_is_terminal() {
        let err = ClientError::from_status(404, false, "missing".into()).unwrap();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        for status in [500, 502, 503, 429] {
            let err = ClientError::from_status(status, false, String::new()).unwrap();
            assert!(err.is_retryable(), "status {} should be retryable", status);
        }
    }

    #[test]
    fn test_client_errors_are_terminal() {
        for status in [400, 401, 403, 422] {
            let err = ClientError::from_status(status, false, String::new()).unwrap();
            assert!(!err.is_retryable(), "status {} should be terminal", status);
        }
    }
}
