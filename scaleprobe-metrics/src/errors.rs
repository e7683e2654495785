//! Metrics error types

use scaleprobe_resilience::Retryable;

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Metrics backend request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Metrics backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Query rejected by metrics backend ({error_type}): {message}")]
    Query { error_type: String, message: String },

    #[error("Malformed metrics response: {0}")]
    Malformed(String),

    #[error("Query returned no series: {query}")]
    Empty { query: String },

    #[error("Invalid metrics URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Retryable for MetricsError {
    fn is_retryable(&self) -> bool {
        match self {
            MetricsError::Request(_) | MetricsError::Empty { .. } => true,
            MetricsError::Status { status, .. } => *status >= 500 || *status == 429,
            // bad_data is a query syntax problem; anything else may be transient
            MetricsError::Query { error_type, .. } => error_type != "bad_data",
            MetricsError::Malformed(_) | MetricsError::Url(_) => false,
        }
    }
}
