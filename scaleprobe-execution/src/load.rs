//! Closed-loop load generation
//!
//! A load window is a fixed pool of workers joined at a single point. Each
//! worker issues back-to-back requests until the shared stop condition is
//! met and keeps its outcomes to itself; the buffers are merged once every
//! worker has returned, so nothing is sampled while requests are in flight.

use crate::input::{InputGenerator, InputStream};
use chrono::Utc;
use scaleprobe_config::TargetConfig;
use scaleprobe_core::{Endpoint, RequestOutcome, RequestStatus, StopCondition, TimeWindow};
use scaleprobe_http::TargetClient;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Everything one load window produced
#[derive(Debug, Clone)]
pub struct LoadRun {
    /// Outcomes of every issued request, ordered by issue time
    pub outcomes: Vec<RequestOutcome>,
    /// Wall-clock window from the first worker start to the last worker exit
    pub window: TimeWindow,
    pub elapsed: Duration,
}

struct WorkerShared {
    client: Arc<dyn TargetClient>,
    path_template: String,
    instance_field: String,
    request_timeout: Duration,
    stop: StopCondition,
    deadline: Instant,
    issued: AtomicU64,
    stopping: AtomicBool,
}

impl WorkerShared {
    /// Claim the right to issue one more request
    fn claim(&self) -> bool {
        if self.stopping.load(Ordering::Acquire) {
            return false;
        }
        let issued = self.issued.fetch_add(1, Ordering::AcqRel);
        let proceed = match self.stop {
            StopCondition::Duration(_) => Instant::now() < self.deadline,
            StopCondition::RequestCount(budget) => issued < budget,
        };
        if !proceed {
            self.stopping.store(true, Ordering::Release);
        }
        proceed
    }
}

async fn run_worker(shared: Arc<WorkerShared>, mut input: InputStream) -> Vec<RequestOutcome> {
    let mut outcomes = Vec::new();

    while shared.claim() {
        let url = shared
            .path_template
            .replace("{n}", &input.next_value().to_string());
        let issued_at = Utc::now();
        let started = Instant::now();

        let (status, instance) = match shared.client.get(&url, shared.request_timeout).await {
            Ok(response) => (
                RequestStatus::Success,
                response.instance_label(&shared.instance_field),
            ),
            Err(e) => (e.request_status(), None),
        };

        outcomes.push(RequestOutcome {
            issued_at,
            latency: started.elapsed(),
            status,
            instance,
        });
    }

    outcomes
}

/// Drives synthetic load against an endpoint
#[derive(Clone)]
pub struct LoadDriver {
    client: Arc<dyn TargetClient>,
    request_path: String,
    instance_field: String,
    request_timeout: Duration,
    input: InputGenerator,
}

impl LoadDriver {
    pub fn new(client: Arc<dyn TargetClient>, config: &TargetConfig, input: InputGenerator) -> Self {
        Self {
            client,
            request_path: config.request_path.clone(),
            instance_field: config.instance_field.clone(),
            request_timeout: config.request_timeout,
            input,
        }
    }

    /// Run one load window with exactly `concurrency` workers
    pub async fn run_load(
        &self,
        endpoint: &Endpoint,
        concurrency: usize,
        stop: StopCondition,
    ) -> LoadRun {
        let concurrency = concurrency.max(1);
        let started = Instant::now();
        let window_start = Utc::now();
        let deadline = match stop {
            StopCondition::Duration(duration) => started + duration,
            StopCondition::RequestCount(_) => started,
        };

        let shared = Arc::new(WorkerShared {
            client: Arc::clone(&self.client),
            path_template: endpoint.url_for(&self.request_path),
            instance_field: self.instance_field.clone(),
            request_timeout: self.request_timeout,
            stop,
            deadline,
            issued: AtomicU64::new(0),
            stopping: AtomicBool::new(false),
        });

        debug!(concurrency, %stop, "Starting load window against {}", endpoint.base_url);

        let mut workers = JoinSet::new();
        for index in 0..concurrency {
            workers.spawn(run_worker(Arc::clone(&shared), self.input.stream(index)));
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(mut worker_outcomes) => outcomes.append(&mut worker_outcomes),
                Err(e) => warn!("Load worker ended abnormally: {}", e),
            }
        }

        let elapsed = started.elapsed();
        let window = TimeWindow::new(window_start, Utc::now());
        outcomes.sort_by_key(|o| o.issued_at);

        info!(
            requests = outcomes.len(),
            successes = outcomes.iter().filter(|o| o.is_success()).count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Load window finished"
        );

        LoadRun {
            outcomes,
            window,
            elapsed,
        }
    }

    /// Unmeasured burst ahead of a load window; returns the number of requests issued
    pub async fn warmup(&self, endpoint: &Endpoint, concurrency: usize, duration: Duration) -> usize {
        if duration.is_zero() {
            return 0;
        }
        let run = self
            .run_load(endpoint, concurrency, StopCondition::Duration(duration))
            .await;
        debug!("Warmup issued {} requests", run.outcomes.len());
        run.outcomes.len()
    }
}
