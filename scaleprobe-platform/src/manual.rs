//! Operator-driven platform

use crate::errors::PlatformError;
use crate::DeploymentPlatform;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// For deployments the harness cannot scale itself. The operator is asked
/// to scale by hand and the requested count is reported as ready.
#[derive(Debug)]
pub struct ManualPlatform {
    deployment: String,
    requested: AtomicU32,
}

impl ManualPlatform {
    pub fn new(deployment: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            requested: AtomicU32::new(0),
        }
    }
}

#[async_trait::async_trait]
impl DeploymentPlatform for ManualPlatform {
    async fn scale(&self, replicas: u32) -> Result<(), PlatformError> {
        warn!(
            "Manual platform: scale {} to {} replicas now; readiness is assumed after stabilization",
            self.deployment, replicas
        );
        self.requested.store(replicas, Ordering::SeqCst);
        Ok(())
    }

    async fn ready_instances(&self) -> Result<Vec<String>, PlatformError> {
        let requested = self.requested.load(Ordering::SeqCst);
        Ok((1..=requested)
            .map(|i| format!("{}-{}", self.deployment, i))
            .collect())
    }

    fn describe(&self) -> String {
        format!("manual deployment {}", self.deployment)
    }
}
