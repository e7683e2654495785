//! HTTP error types

use scaleprobe_core::RequestStatus;
use scaleprobe_resilience::Retryable;

/// Error type for requests against the target service
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Unexpected response from {url}: {message}")]
    UnexpectedBody { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl HttpError {
    /// Classify a reqwest failure for `url`
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else if err.is_body() || err.is_decode() {
            HttpError::UnexpectedBody {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            // connect, request and redirect failures all mean the address is unusable
            HttpError::Connect {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Timeouts and refused connections, as opposed to a reachable but unhappy service
    pub fn is_connection_level(&self) -> bool {
        matches!(self, HttpError::Timeout { .. } | HttpError::Connect { .. })
    }

    /// Outcome classification used in load statistics
    pub fn request_status(&self) -> RequestStatus {
        match self {
            HttpError::Timeout { .. } => RequestStatus::Timeout,
            HttpError::Status { status, .. } => RequestStatus::HttpError(*status),
            HttpError::UnexpectedBody { .. } | HttpError::Connect { .. } | HttpError::Build(_) => {
                RequestStatus::ConnectionError
            }
        }
    }
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            HttpError::Timeout { .. } | HttpError::Connect { .. } => true,
            HttpError::Status { status, .. } => *status >= 500 || *status == 429,
            HttpError::UnexpectedBody { .. } => true,
            HttpError::Build(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let unavailable = HttpError::Status {
            url: "http://x/factorial/50".to_string(),
            status: 503,
        };
        assert!(unavailable.is_retryable());
        assert!(!unavailable.is_connection_level());
        assert_eq!(unavailable.request_status(), RequestStatus::HttpError(503));

        let not_found = HttpError::Status {
            url: "http://x/factorial/50".to_string(),
            status: 404,
        };
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_connection_level_errors() {
        let timeout = HttpError::Timeout {
            url: "http://x".to_string(),
        };
        assert!(timeout.is_connection_level());
        assert_eq!(timeout.request_status(), RequestStatus::Timeout);

        let refused = HttpError::Connect {
            url: "http://x".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(refused.is_connection_level());
        assert_eq!(refused.request_status(), RequestStatus::ConnectionError);
    }
}
