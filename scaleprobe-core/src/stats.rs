//! Request statistics derived from a completed load window

use std::time::Duration;

use crate::types::{RequestOutcome, RequestStatus};

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Percentile of already sorted values.
///
/// The rank is `p / 100 * (n - 1)`; when it falls between two positions the
/// result is linearly interpolated between the neighbouring values.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Aggregate request statistics for one load window
#[derive(Debug, Clone, PartialEq)]
pub struct LoadStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub timeouts: u64,
    pub connection_errors: u64,
    pub http_errors: u64,
    /// Successful requests per second of wall-clock time
    pub rps: f64,
    /// Fraction of outcomes that succeeded, in [0, 1]
    pub success_rate: f64,
    pub latency_avg_ms: Option<f64>,
    pub latency_max_ms: Option<f64>,
    pub latency_p95_ms: Option<f64>,
    pub elapsed: Duration,
}

impl LoadStats {
    pub fn from_outcomes(outcomes: &[RequestOutcome], elapsed: Duration) -> Self {
        let mut timeouts = 0;
        let mut connection_errors = 0;
        let mut http_errors = 0;
        let mut latencies_ms = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            match outcome.status {
                RequestStatus::Success => latencies_ms.push(outcome.latency.as_secs_f64() * 1000.0),
                RequestStatus::Timeout => timeouts += 1,
                RequestStatus::ConnectionError => connection_errors += 1,
                RequestStatus::HttpError(_) => http_errors += 1,
            }
        }

        latencies_ms.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let total = outcomes.len() as u64;
        let successful = latencies_ms.len() as u64;
        let elapsed_secs = elapsed.as_secs_f64();

        let rps = if elapsed_secs > 0.0 {
            successful as f64 / elapsed_secs
        } else {
            0.0
        };
        let success_rate = if total > 0 {
            successful as f64 / total as f64
        } else {
            0.0
        };

        Self {
            total,
            successful,
            failed: total - successful,
            timeouts,
            connection_errors,
            http_errors,
            rps,
            success_rate,
            latency_avg_ms: mean(&latencies_ms),
            latency_max_ms: latencies_ms.last().copied(),
            latency_p95_ms: percentile(&latencies_ms, 95.0),
            elapsed,
        }
    }
}
