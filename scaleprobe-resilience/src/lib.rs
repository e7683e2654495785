//! Resilience patterns for scaleprobe
//!
//! Bounded retries with backoff for probes, scale commands and metric
//! queries, plus the stop signal the orchestrator checks between tests.

pub mod backoff;
pub mod retry;
pub mod stop;

pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
pub use stop::StopSignal;
