//! Metrics backend abstraction

use crate::errors::MetricsError;
use chrono::{DateTime, Utc};
use scaleprobe_core::TimeWindow;
use std::collections::BTreeMap;
use std::time::Duration;

/// One labelled time series returned by a range query
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: BTreeMap<String, String>,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

/// Anything that can answer a range query over a time window
#[async_trait::async_trait]
pub trait MetricsBackend: Send + Sync {
    async fn query_range(
        &self,
        query: &str,
        window: &TimeWindow,
        step: Duration,
    ) -> Result<Vec<Series>, MetricsError>;
}
