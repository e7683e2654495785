//! `kubectl`-backed platform

use crate::errors::PlatformError;
use crate::{DeploymentPlatform, PortForwardLauncher};
use scaleprobe_config::DeploymentConfig;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Time a freshly spawned port forward gets before it is checked for an early exit
const PORT_FORWARD_SETTLE: Duration = Duration::from_millis(750);

/// Drives a Kubernetes deployment through the `kubectl` CLI
#[derive(Debug, Clone)]
pub struct KubectlPlatform {
    kubectl_path: String,
    namespace: String,
    deployment: String,
    selector: String,
    command_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: PodMetadata,
    #[serde(default)]
    status: Option<PodStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodMetadata {
    name: String,
    #[serde(default)]
    deletion_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PodStatus {
    #[serde(default)]
    conditions: Vec<PodCondition>,
}

#[derive(Debug, Deserialize)]
struct PodCondition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

impl Pod {
    fn is_ready(&self) -> bool {
        self.metadata.deletion_timestamp.is_none()
            && self.status.as_ref().is_some_and(|status| {
                status
                    .conditions
                    .iter()
                    .any(|c| c.kind == "Ready" && c.status == "True")
            })
    }
}

/// Names of ready, non-terminating pods in `kubectl get pods -o json` output
pub fn parse_ready_pods(json: &str) -> Result<Vec<String>, PlatformError> {
    let pods: PodList =
        serde_json::from_str(json).map_err(|e| PlatformError::Parse(format!("pod list: {}", e)))?;
    let mut ready: Vec<String> = pods
        .items
        .into_iter()
        .filter(Pod::is_ready)
        .map(|pod| pod.metadata.name)
        .collect();
    ready.sort();
    Ok(ready)
}

impl KubectlPlatform {
    pub fn new(
        kubectl_path: impl Into<String>,
        namespace: impl Into<String>,
        deployment: impl Into<String>,
        selector: impl Into<String>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            kubectl_path: kubectl_path.into(),
            namespace: namespace.into(),
            deployment: deployment.into(),
            selector: selector.into(),
            command_timeout,
        }
    }

    pub fn from_config(config: &DeploymentConfig) -> Self {
        Self::new(
            &config.kubectl_path,
            &config.namespace,
            &config.name,
            &config.selector,
            config.command_timeout,
        )
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.kubectl_path, args.join(" "))
    }

    /// Run kubectl to completion and return its stdout
    async fn run(&self, args: Vec<String>) -> Result<String, PlatformError> {
        let command = self.command_line(&args);
        debug!("Running {}", command);

        let child = Command::new(&self.kubectl_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlatformError::Spawn {
                command: command.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.command_timeout, child.wait_with_output())
            .await
            .map_err(|_| PlatformError::CommandTimeout {
                command: command.clone(),
                timeout: self.command_timeout,
            })?
            .map_err(|source| PlatformError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(PlatformError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl DeploymentPlatform for KubectlPlatform {
    async fn scale(&self, replicas: u32) -> Result<(), PlatformError> {
        info!(
            deployment = %self.deployment,
            namespace = %self.namespace,
            replicas,
            "Scaling deployment"
        );
        self.run(vec![
            "scale".to_string(),
            "deployment".to_string(),
            self.deployment.clone(),
            format!("--replicas={}", replicas),
            "-n".to_string(),
            self.namespace.clone(),
        ])
        .await?;
        Ok(())
    }

    async fn ready_instances(&self) -> Result<Vec<String>, PlatformError> {
        let stdout = self
            .run(vec![
                "get".to_string(),
                "pods".to_string(),
                "-n".to_string(),
                self.namespace.clone(),
                "-l".to_string(),
                self.selector.clone(),
                "-o".to_string(),
                "json".to_string(),
            ])
            .await?;
        parse_ready_pods(&stdout)
    }

    fn describe(&self) -> String {
        format!("kubectl deployment {}/{}", self.namespace, self.deployment)
    }
}

/// Running `kubectl port-forward`; the child is killed when this is dropped
#[derive(Debug)]
pub struct PortForwardHandle {
    child: Child,
    pub local_port: u16,
}

impl PortForwardHandle {
    /// Whether the forwarding process is still running
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("Port forward on {} exited with {}", self.local_port, status);
                false
            }
            Err(_) => false,
        }
    }
}

#[async_trait::async_trait]
impl PortForwardLauncher for KubectlPlatform {
    async fn launch(
        &self,
        service: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Result<PortForwardHandle, PlatformError> {
        let args = vec![
            "port-forward".to_string(),
            format!("svc/{}", service),
            format!("{}:{}", local_port, remote_port),
            "-n".to_string(),
            self.namespace.clone(),
        ];
        let command = self.command_line(&args);
        info!("Starting {}", command);

        let mut child = Command::new(&self.kubectl_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlatformError::Spawn { command, source })?;

        tokio::time::sleep(PORT_FORWARD_SETTLE).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(PlatformError::PortForward(format!(
                "kubectl port-forward to {} exited with {}",
                service, status
            )));
        }

        Ok(PortForwardHandle {
            child,
            local_port,
        })
    }
}
