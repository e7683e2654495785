//! Per-test metric sampling

use crate::backend::MetricsBackend;
use crate::errors::MetricsError;
use chrono::Utc;
use scaleprobe_config::{DeploymentConfig, MetricsConfig};
use scaleprobe_core::{MetricKind, MetricSample, SampleSet, TimeWindow};
use scaleprobe_resilience::{RetryExecutor, RetryPolicy};
use tracing::{debug, info, warn};

/// Values substituted into query templates
#[derive(Debug, Clone, PartialEq)]
pub struct QueryContext {
    pub namespace: String,
    pub deployment: String,
    pub app: String,
}

impl QueryContext {
    /// `app` comes from an `app=<name>` selector, falling back to the deployment name
    pub fn from_deployment(config: &DeploymentConfig) -> Self {
        let app = config
            .selector
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| key.trim() == "app")
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_else(|| config.name.clone());

        Self {
            namespace: config.namespace.clone(),
            deployment: config.name.clone(),
            app,
        }
    }

    pub fn render(&self, template: &str) -> String {
        template
            .replace("{namespace}", &self.namespace)
            .replace("{deployment}", &self.deployment)
            .replace("{app}", &self.app)
    }
}

/// Retrieves every configured metric for a test's time window
pub struct MetricSampler<B> {
    backend: B,
    config: MetricsConfig,
    context: QueryContext,
    retry: RetryExecutor,
}

impl<B: MetricsBackend> MetricSampler<B> {
    pub fn new(backend: B, config: MetricsConfig, context: QueryContext) -> Self {
        let retry = RetryExecutor::new(RetryPolicy::from(&config.retry));
        Self {
            backend,
            config,
            context,
            retry,
        }
    }

    /// Query template configured for `kind`
    fn template(&self, kind: MetricKind) -> &str {
        let queries = &self.config.queries;
        match kind {
            MetricKind::RequestCount => &queries.request_count,
            MetricKind::Cpu => &queries.cpu,
            MetricKind::Memory => &queries.memory,
            MetricKind::ReplicaCount => &queries.replica_count,
        }
    }

    /// Sample all metrics for `window` extended by the scrape margin.
    ///
    /// Waits until the extended window has closed. Never fails: metrics that
    /// stay empty or erroring after the retries land in `unavailable`.
    pub async fn sample(&self, window: TimeWindow) -> SampleSet {
        let mut set = SampleSet::default();

        if !self.config.enabled {
            debug!("Metrics disabled; marking all metrics unavailable");
            set.unavailable.extend(MetricKind::all().iter().copied());
            return set;
        }

        let window = window.with_trailing_margin(self.config.scrape_margin);
        if let Ok(wait) = (window.end - Utc::now()).to_std() {
            debug!("Waiting {:?} for the final scrape", wait);
            tokio::time::sleep(wait).await;
        }

        for &kind in MetricKind::all() {
            match self.sample_metric(kind, &window).await {
                Ok(samples) => {
                    debug!("{}: {} samples", kind, samples.len());
                    set.samples.extend(samples);
                }
                Err(e) => {
                    warn!("Metric {} unavailable: {}", kind, e);
                    set.unavailable.insert(kind);
                }
            }
        }

        info!(
            samples = set.samples.len(),
            unavailable = set.unavailable.len(),
            "Metric sampling complete"
        );
        set
    }

    async fn sample_metric(
        &self,
        kind: MetricKind,
        window: &TimeWindow,
    ) -> Result<Vec<MetricSample>, MetricsError> {
        let rendered = self.context.render(self.template(kind));
        let query = &rendered;
        let step = self.config.step;
        let backend = &self.backend;

        let series = self
            .retry
            .execute(move || async move {
                let series = backend.query_range(query, window, step).await?;
                if series.is_empty() {
                    return Err(MetricsError::Empty {
                        query: query.clone(),
                    });
                }
                Ok(series)
            })
            .await
            .map_err(|e| e.into_inner())?;

        let mut samples = Vec::new();
        for series in series {
            // series without the instance label are deployment-wide
            let instance = series
                .labels
                .get(&self.config.instance_label)
                .cloned()
                .unwrap_or_else(|| self.context.deployment.clone());
            samples.extend(series.points.into_iter().map(|(sampled_at, value)| MetricSample {
                metric: kind,
                instance: instance.clone(),
                value,
                sampled_at,
            }));
        }
        Ok(samples)
    }
}
