//! Deployment platform boundary
//!
//! The harness needs exactly two things from the platform: "set the
//! replica count of deployment D to N" and "list the ready instances of D".
//! [`KubectlPlatform`] provides both through the `kubectl` CLI;
//! [`ManualPlatform`] lets an operator scale by hand.

pub mod errors;
pub mod kubectl;
pub mod manual;
pub mod readiness;

use std::sync::Arc;

pub use errors::PlatformError;
pub use kubectl::{parse_ready_pods, KubectlPlatform, PortForwardHandle};
pub use manual::ManualPlatform;
pub use readiness::wait_for_ready;

use scaleprobe_config::{DeploymentConfig, PlatformKind};

/// Scaling and readiness operations of a deployment platform
#[async_trait::async_trait]
pub trait DeploymentPlatform: Send + Sync {
    /// Request `replicas` instances of the deployment
    async fn scale(&self, replicas: u32) -> Result<(), PlatformError>;

    /// Names of instances that are ready and not terminating
    async fn ready_instances(&self) -> Result<Vec<String>, PlatformError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Starts local port forwards to a cluster service
#[async_trait::async_trait]
pub trait PortForwardLauncher: Send + Sync {
    async fn launch(
        &self,
        service: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Result<PortForwardHandle, PlatformError>;
}

/// Build the platform selected in configuration
pub fn platform_from_config(config: &DeploymentConfig) -> Arc<dyn DeploymentPlatform> {
    match config.platform {
        PlatformKind::Kubectl => Arc::new(KubectlPlatform::from_config(config)),
        PlatformKind::Manual => Arc::new(ManualPlatform::new(&config.name)),
    }
}
