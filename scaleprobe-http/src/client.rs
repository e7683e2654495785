//! Target service client

use crate::config::HttpClientConfig;
use crate::errors::HttpError;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, trace};

/// Response from the target service
#[derive(Debug, Clone, PartialEq)]
pub struct TargetResponse {
    pub status: u16,
    /// Parsed body; `None` when the body is not JSON
    pub body: Option<JsonValue>,
}

impl TargetResponse {
    /// Read `field` from the body as a label; numbers and strings are accepted
    pub fn instance_label(&self, field: &str) -> Option<String> {
        match self.body.as_ref()?.get(field)? {
            JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Issues GET requests against the target service
#[async_trait::async_trait]
pub trait TargetClient: Send + Sync {
    /// GET `url`, failing on transport errors and non-2xx statuses
    async fn get(&self, url: &str, timeout: Duration) -> Result<TargetResponse, HttpError>;
}

/// Check that a probe response carries the expected JSON field
pub fn check_probe_response(
    response: &TargetResponse,
    url: &str,
    expect_field: Option<&str>,
) -> Result<(), HttpError> {
    let Some(field) = expect_field else {
        return Ok(());
    };
    match &response.body {
        Some(body) if body.get(field).is_some() => Ok(()),
        Some(_) => Err(HttpError::UnexpectedBody {
            url: url.to_string(),
            message: format!("missing field '{}'", field),
        }),
        None => Err(HttpError::UnexpectedBody {
            url: url.to_string(),
            message: "body is not JSON".to_string(),
        }),
    }
}

/// `reqwest`-backed client; cheap to clone, clones share one connection pool
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: Client,
}

impl HttpTarget {
    pub fn new(config: &HttpClientConfig) -> Result<Self, HttpError> {
        debug!(
            "Creating target client with {}ms default timeout",
            config.default_timeout.as_millis()
        );
        let client = Client::builder()
            .timeout(config.default_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(HttpError::Build)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl TargetClient for HttpTarget {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TargetResponse, HttpError> {
        trace!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HttpError::from_reqwest(e, url))?;
        let body = serde_json::from_slice(&bytes).ok();

        Ok(TargetResponse {
            status: status.as_u16(),
            body,
        })
    }
}
