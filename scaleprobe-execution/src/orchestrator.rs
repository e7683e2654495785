//! Test orchestration
//!
//! Tests run strictly one after another. Each moves through
//! SCALE, WAIT_READY, WARMUP, LOAD, SAMPLE, ANALYZE and RECORD; a test that
//! cannot be scaled or never becomes ready is recorded as a failed row and
//! the matrix moves on. Only configuration errors, an unreachable target and
//! dataset write failures end the run.

use crate::analyzer::Analyzer;
use crate::error::{HarnessError, HarnessResult};
use crate::load::LoadDriver;
use crate::resolver::Resolver;
use scaleprobe_config::{LoadConfig, MatrixConfig, ScaleProbeConfig, StopConditionConfig};
use scaleprobe_core::{
    BaselineCell, DegradedReason, Endpoint, StopCondition, TestConfiguration, TestResult,
};
use scaleprobe_metrics::{MetricSampler, MetricsBackend};
use scaleprobe_output::DatasetWriter;
use scaleprobe_platform::{wait_for_ready, DeploymentPlatform, PlatformError};
use scaleprobe_resilience::{RetryExecutor, RetryPolicy, StopSignal};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Stop condition of every load window in the run
pub fn stop_condition_from_config(config: StopConditionConfig) -> StopCondition {
    match config {
        StopConditionConfig::Duration { seconds } => {
            StopCondition::Duration(Duration::from_secs(seconds))
        }
        StopConditionConfig::Requests { count } => StopCondition::RequestCount(count),
    }
}

/// Expand the matrix into tests: ascending unique replica counts, each
/// repeated `repetitions` times, so single-replica tests always come first
pub fn plan_tests(matrix: &MatrixConfig, load: &LoadConfig) -> HarnessResult<Vec<TestConfiguration>> {
    let replica_counts = matrix.ordered_replica_counts();
    if replica_counts.is_empty() {
        return Err(HarnessError::Configuration(
            "matrix.replica_counts must contain at least one replica count".to_string(),
        ));
    }
    if replica_counts.contains(&0) {
        return Err(HarnessError::Configuration(
            "matrix.replica_counts must be positive".to_string(),
        ));
    }
    if matrix.repetitions == 0 {
        return Err(HarnessError::Configuration(
            "matrix.repetitions must be at least 1".to_string(),
        ));
    }

    let stop_condition = stop_condition_from_config(load.stop);
    let mut tests = Vec::with_capacity(replica_counts.len() * matrix.repetitions as usize);
    for replica_count in replica_counts {
        for repetition_index in 0..matrix.repetitions {
            tests.push(TestConfiguration {
                test_id: tests.len() as u32 + 1,
                replica_count,
                concurrency_level: load.concurrency,
                stop_condition,
                repetition_index,
            });
        }
    }
    Ok(tests)
}

/// Why a run ended before its matrix was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    DeadlineExceeded,
}

/// What one orchestrator run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub endpoint: Endpoint,
    pub planned: usize,
    /// Results in execution order; every one of them was written to the dataset
    pub results: Vec<TestResult>,
    pub stopped: Option<StopReason>,
}

/// Timing knobs of the per-test state machine
#[derive(Debug, Clone)]
struct Timings {
    readiness_timeout: Duration,
    poll_interval: Duration,
    stabilization: Duration,
    cooldown: Duration,
    warmup: Duration,
    warmup_concurrency: usize,
    deadline: Option<Duration>,
}

/// Runs the test matrix against one deployment
pub struct Orchestrator<B> {
    tests: Vec<TestConfiguration>,
    timings: Timings,
    resolver: Resolver,
    driver: LoadDriver,
    sampler: MetricSampler<B>,
    platform: Arc<dyn DeploymentPlatform>,
    scale_retry: RetryExecutor,
    analyzer: Analyzer,
    writer: DatasetWriter,
    baseline: BaselineCell,
    stop: StopSignal,
}

impl<B: MetricsBackend> Orchestrator<B> {
    /// Fails when the matrix in `config` is unusable
    pub fn new(
        config: &ScaleProbeConfig,
        resolver: Resolver,
        driver: LoadDriver,
        sampler: MetricSampler<B>,
        platform: Arc<dyn DeploymentPlatform>,
        writer: DatasetWriter,
    ) -> HarnessResult<Self> {
        let tests = plan_tests(&config.matrix, &config.load)?;
        let deployment = &config.deployment;

        Ok(Self {
            tests,
            timings: Timings {
                readiness_timeout: deployment.readiness_timeout,
                poll_interval: deployment.poll_interval,
                stabilization: deployment.stabilization,
                cooldown: deployment.cooldown,
                warmup: config.load.warmup,
                warmup_concurrency: config.load.effective_warmup_concurrency(),
                deadline: config.matrix.deadline,
            },
            resolver,
            driver,
            sampler,
            platform,
            scale_retry: RetryExecutor::new(RetryPolicy::from(&deployment.scale_retry)),
            analyzer: Analyzer::new(config.analysis.clone()),
            writer,
            baseline: BaselineCell::new(),
            stop: StopSignal::new(),
        })
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn planned_tests(&self) -> &[TestConfiguration] {
        &self.tests
    }

    pub fn baseline(&self) -> &BaselineCell {
        &self.baseline
    }

    /// Resolve the target, then run and record every planned test
    pub async fn run(&mut self) -> HarnessResult<RunReport> {
        let run_started = Instant::now();
        info!(
            "Running {} tests against {}",
            self.tests.len(),
            self.platform.describe()
        );

        let mut endpoint = self.resolver.resolve().await?;
        let mut results = Vec::with_capacity(self.tests.len());
        let mut stopped = None;
        let tests = self.tests.clone();

        for (index, test) in tests.iter().enumerate() {
            if let Some(reason) = self.should_stop(run_started) {
                warn!(
                    "Stopping before test {} ({:?}); {} of {} tests completed",
                    test.test_id,
                    reason,
                    results.len(),
                    tests.len()
                );
                stopped = Some(reason);
                break;
            }

            let (result, current) = self.run_test(test).await?;
            if let Some(current) = current {
                endpoint = current;
            }

            self.writer.append(&result)?;
            info!(
                test_id = result.test_id,
                replicas = result.replicas,
                rps = result.rps.unwrap_or(0.0),
                degraded = result.is_degraded(),
                "Recorded test {}/{}",
                index + 1,
                tests.len()
            );
            results.push(result);

            if index + 1 < tests.len() {
                self.cooldown().await;
            }
        }

        Ok(RunReport {
            endpoint,
            planned: tests.len(),
            results,
            stopped,
        })
    }

    fn should_stop(&self, run_started: Instant) -> Option<StopReason> {
        if self.stop.is_triggered() {
            return Some(StopReason::Interrupted);
        }
        match self.timings.deadline {
            Some(deadline) if run_started.elapsed() >= deadline => Some(StopReason::DeadlineExceeded),
            _ => None,
        }
    }

    async fn cooldown(&self) {
        if self.timings.cooldown.is_zero() {
            return;
        }
        debug!("Cooling down for {:?}", self.timings.cooldown);
        tokio::select! {
            _ = tokio::time::sleep(self.timings.cooldown) => {}
            _ = self.stop.triggered() => {}
        }
    }

    /// Run one test. The endpoint is returned when it had to be checked.
    async fn run_test(
        &mut self,
        test: &TestConfiguration,
    ) -> HarnessResult<(TestResult, Option<Endpoint>)> {
        let started = Instant::now();
        let replicas = test.replica_count;
        info!(
            test_id = test.test_id,
            replicas,
            repetition = test.repetition_index,
            "Starting test"
        );

        // SCALE
        let platform = &self.platform;
        if let Err(e) = self
            .scale_retry
            .execute(move || async move { platform.scale(replicas).await })
            .await
        {
            warn!("Scaling to {} replicas failed: {}", replicas, e);
            let reason = match e.last_error() {
                PlatformError::CommandTimeout { .. } => DegradedReason::ScaleTimeout,
                _ => DegradedReason::ScaleFailed,
            };
            return Ok((TestResult::failed(test, reason, started.elapsed()), None));
        }

        // WAIT_READY
        match wait_for_ready(
            self.platform.as_ref(),
            replicas,
            self.timings.readiness_timeout,
            self.timings.poll_interval,
        )
        .await
        {
            Ok(instances) => debug!("Ready instances: {}", instances.join(", ")),
            Err(e) => {
                warn!("Test {} not ready: {}", test.test_id, e);
                return Ok((
                    TestResult::failed(test, DegradedReason::ReadinessTimeout, started.elapsed()),
                    None,
                ));
            }
        }

        if !self.timings.stabilization.is_zero() {
            debug!("Stabilizing for {:?}", self.timings.stabilization);
            tokio::time::sleep(self.timings.stabilization).await;
        }

        let endpoint = self.resolver.ensure().await?;

        // WARMUP
        self.driver
            .warmup(&endpoint, self.timings.warmup_concurrency, self.timings.warmup)
            .await;

        // LOAD
        let run = self
            .driver
            .run_load(&endpoint, test.concurrency_level, test.stop_condition)
            .await;

        // SAMPLE
        let samples = self.sampler.sample(run.window).await;
        if !samples.unavailable.is_empty() {
            debug!("Unavailable metrics: {:?}", samples.unavailable);
        }

        // ANALYZE
        let result = self
            .analyzer
            .analyze(test, &run, &samples, &mut self.baseline, started.elapsed());

        Ok((result, Some(endpoint)))
    }
}
