//! Readiness polling

use crate::errors::PlatformError;
use crate::DeploymentPlatform;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Poll until at least `expected` instances are ready.
///
/// Errors from individual polls are logged and polling continues; only the
/// overall timeout ends the wait.
pub async fn wait_for_ready(
    platform: &dyn DeploymentPlatform,
    expected: u32,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Vec<String>, PlatformError> {
    let started = Instant::now();
    let deadline = started + timeout;
    let mut last_ready = 0;

    loop {
        match platform.ready_instances().await {
            Ok(ready) if ready.len() >= expected as usize => {
                info!(
                    ready = ready.len(),
                    expected,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Deployment ready"
                );
                return Ok(ready);
            }
            Ok(ready) => {
                debug!("{}/{} instances ready", ready.len(), expected);
                last_ready = ready.len();
            }
            Err(e) => warn!("Readiness check failed: {}", e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PlatformError::ReadinessTimeout {
                expected,
                ready: last_ready,
                waited: started.elapsed(),
            });
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Gains one ready instance per poll, up to `max`
    struct SlowPlatform {
        polls: AtomicU32,
        max: u32,
        fail_first: bool,
    }

    #[async_trait::async_trait]
    impl DeploymentPlatform for SlowPlatform {
        async fn scale(&self, _replicas: u32) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn ready_instances(&self) -> Result<Vec<String>, PlatformError> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && poll == 0 {
                return Err(PlatformError::Parse("transient".to_string()));
            }
            let ready = poll.min(self.max);
            Ok((0..ready).map(|i| format!("pod-{}", i)).collect())
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_expected_instances_ready() {
        let platform = SlowPlatform {
            polls: AtomicU32::new(0),
            max: 3,
            fail_first: true,
        };
        let ready = wait_for_ready(&platform, 3, Duration::from_secs(90), Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(ready.len(), 3);
        assert_eq!(platform.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_partial_readiness() {
        let platform = SlowPlatform {
            polls: AtomicU32::new(0),
            max: 1,
            fail_first: false,
        };
        let err = wait_for_ready(&platform, 2, Duration::from_secs(10), Duration::from_secs(3))
            .await
            .unwrap_err();
        match err {
            PlatformError::ReadinessTimeout {
                expected, ready, ..
            } => {
                assert_eq!(expected, 2);
                assert_eq!(ready, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
