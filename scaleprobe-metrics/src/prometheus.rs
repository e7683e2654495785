//! Prometheus HTTP API backend

use crate::backend::{MetricsBackend, Series};
use crate::errors::MetricsError;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use scaleprobe_config::MetricsConfig;
use scaleprobe_core::TimeWindow;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Client for `/api/v1/query_range`
#[derive(Debug, Clone)]
pub struct PrometheusBackend {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<ApiSeries>,
}

#[derive(Debug, Deserialize)]
struct ApiSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

impl PrometheusBackend {
    pub fn new(base_url: &str, query_timeout: Duration) -> Result<Self, MetricsError> {
        let client = Client::builder().timeout(query_timeout).build()?;
        let mut base_url = Url::parse(base_url)?;
        // keep a path prefix such as /prometheus when joining the API path
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &MetricsConfig) -> Result<Self, MetricsError> {
        Self::new(&config.url, config.query_timeout)
    }

    fn query_url(&self, query: &str, window: &TimeWindow, step: Duration) -> Result<Url, MetricsError> {
        let mut url = self.base_url.join("api/v1/query_range")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("start", &unix_seconds(window.start))
            .append_pair("end", &unix_seconds(window.end))
            .append_pair("step", &format!("{}s", step.as_secs().max(1)));
        Ok(url)
    }
}

fn unix_seconds(ts: DateTime<Utc>) -> String {
    format!("{:.3}", ts.timestamp_millis() as f64 / 1000.0)
}

fn parse_response(body: ApiResponse) -> Result<Vec<Series>, MetricsError> {
    if body.status != "success" {
        return Err(MetricsError::Query {
            error_type: body.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: body.error.unwrap_or_default(),
        });
    }

    let data = body
        .data
        .ok_or_else(|| MetricsError::Malformed("missing data".to_string()))?;
    if data.result_type != "matrix" {
        return Err(MetricsError::Malformed(format!(
            "expected a matrix result, got {}",
            data.result_type
        )));
    }

    Ok(data
        .result
        .into_iter()
        .map(|series| Series {
            labels: series.metric,
            points: series
                .values
                .into_iter()
                .filter_map(|(ts, raw)| {
                    let value: f64 = raw.parse().ok()?;
                    let millis = (ts * 1000.0).round() as i64;
                    let at = Utc.timestamp_millis_opt(millis).single()?;
                    value.is_finite().then_some((at, value))
                })
                .collect(),
        })
        .filter(|series| !series.points.is_empty())
        .collect())
}

#[async_trait::async_trait]
impl MetricsBackend for PrometheusBackend {
    async fn query_range(
        &self,
        query: &str,
        window: &TimeWindow,
        step: Duration,
    ) -> Result<Vec<Series>, MetricsError> {
        let url = self.query_url(query, window, step)?;
        debug!("Prometheus range query: {}", query);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        // Prometheus reports query errors as 400/422 with a JSON body
        let text = response.text().await?;
        match serde_json::from_str::<ApiResponse>(&text) {
            Ok(body) => parse_response(body),
            Err(_) if !status.is_success() => Err(MetricsError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            }),
            Err(e) => Err(MetricsError::Malformed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<Vec<Series>, MetricsError> {
        parse_response(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_parse_matrix() {
        let series = parse(json!({
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {"metric": {"pod": "factorial-a"}, "values": [[1700000000.5, "0.25"], [1700000005.5, "0.5"]]},
                    {"metric": {"pod": "factorial-b"}, "values": [[1700000000.5, "NaN"]]}
                ]
            }
        }))
        .unwrap();

        // NaN-only series are dropped
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].labels["pod"], "factorial-a");
        assert_eq!(series[0].points.len(), 2);
        assert_eq!(series[0].points[1].1, 0.5);
        assert_eq!(series[0].points[0].0.timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_parse_error_status() {
        let err = parse(json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error at char 5"
        }))
        .unwrap_err();
        assert!(matches!(err, MetricsError::Query { ref error_type, .. } if error_type == "bad_data"));
    }

    #[test]
    fn test_parse_rejects_vector_result() {
        let err = parse(json!({
            "status": "success",
            "data": {"resultType": "vector", "result": []}
        }))
        .unwrap_err();
        assert!(matches!(err, MetricsError::Malformed(_)));
    }

    #[test]
    fn test_query_url_encodes_parameters() {
        let backend = PrometheusBackend::new("http://prom:9090", Duration::from_secs(5)).unwrap();
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let window = TimeWindow::new(start, start + chrono::Duration::seconds(15));
        let url = backend
            .query_url("sum by (pod) (up{namespace=\"x\"})", &window, Duration::from_secs(5))
            .unwrap();

        assert_eq!(url.path(), "/api/v1/query_range");
        let pairs: BTreeMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["start"], "1700000000.000");
        assert_eq!(pairs["end"], "1700000015.000");
        assert_eq!(pairs["step"], "5s");
        assert!(pairs["query"].contains("namespace=\"x\""));
    }
}
