//! Connectivity resolution against a scripted target

use async_trait::async_trait;
use scaleprobe_config::{RetrySettings, StrategyConfig, TargetConfig};
use scaleprobe_core::StrategyKind;
use scaleprobe_execution::{PortForwardStrategy, Prober, Resolver, UrlStrategy};
use scaleprobe_http::{HttpError, TargetClient, TargetResponse};
use scaleprobe_platform::{KubectlPlatform, PlatformError, PortForwardHandle, PortForwardLauncher};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const NODE_PORT: &str = "http://10.0.0.1:30080";
const TUNNEL: &str = "http://localhost:8081";

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Healthy,
    Refuse,
    Unavailable,
    MissingField,
}

#[derive(Default)]
struct ScriptedTarget {
    behaviours: Mutex<HashMap<String, Behaviour>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTarget {
    fn set(&self, base: &str, behaviour: Behaviour) {
        self.behaviours.lock().unwrap().insert(base.to_string(), behaviour);
    }

    fn calls_to(&self, base: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.starts_with(base))
            .count()
    }
}

#[async_trait]
impl TargetClient for ScriptedTarget {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<TargetResponse, HttpError> {
        self.calls.lock().unwrap().push(url.to_string());
        let behaviour = self
            .behaviours
            .lock()
            .unwrap()
            .iter()
            .find(|(base, _)| url.starts_with(base.as_str()))
            .map(|(_, b)| *b)
            .unwrap_or(Behaviour::Refuse);

        match behaviour {
            Behaviour::Healthy => Ok(TargetResponse {
                status: 200,
                body: Some(json!({"number": 50, "worker_pid": 4242})),
            }),
            Behaviour::MissingField => Ok(TargetResponse {
                status: 200,
                body: Some(json!({"status": "ok"})),
            }),
            Behaviour::Unavailable => Err(HttpError::Status {
                url: url.to_string(),
                status: 503,
            }),
            Behaviour::Refuse => Err(HttpError::Connect {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

fn target_config() -> TargetConfig {
    TargetConfig {
        strategies: vec![
            StrategyConfig::Direct {
                url: NODE_PORT.to_string(),
            },
            StrategyConfig::Tunnel {
                url: TUNNEL.to_string(),
            },
        ],
        probe_retry: RetrySettings::fixed(3, Duration::from_millis(1)),
        ..Default::default()
    }
}

fn resolver(target: &Arc<ScriptedTarget>) -> Resolver {
    let client: Arc<dyn TargetClient> = target.clone();
    Resolver::from_config(&target_config(), client, None)
}

#[tokio::test]
async fn test_falls_back_after_three_failed_probes() {
    let target = Arc::new(ScriptedTarget::default());
    target.set(TUNNEL, Behaviour::Healthy);
    let mut resolver = resolver(&target);

    let endpoint = resolver.resolve().await.unwrap();

    assert_eq!(endpoint.strategy, StrategyKind::Tunnel);
    assert_eq!(endpoint.base_url, TUNNEL);
    assert_eq!(target.calls_to(NODE_PORT), 3);
    assert_eq!(target.calls_to(TUNNEL), 1);
    assert_eq!(resolver.endpoint(), Some(&endpoint));
}

#[tokio::test]
async fn test_first_healthy_strategy_wins() {
    let target = Arc::new(ScriptedTarget::default());
    target.set(NODE_PORT, Behaviour::Healthy);
    target.set(TUNNEL, Behaviour::Healthy);
    let mut resolver = resolver(&target);

    let endpoint = resolver.resolve().await.unwrap();

    assert_eq!(endpoint.strategy, StrategyKind::Direct);
    assert_eq!(target.calls_to(TUNNEL), 0);
    assert!(target.calls.lock().unwrap()[0].ends_with("/factorial/50"));
}

#[tokio::test]
async fn test_total_failure_lists_every_strategy() {
    let target = Arc::new(ScriptedTarget::default());
    target.set(TUNNEL, Behaviour::Unavailable);
    let mut resolver = resolver(&target);

    let failure = resolver.resolve().await.unwrap_err();

    assert_eq!(failure.failures.len(), 2);
    assert!(failure.failures[0].strategy.contains(NODE_PORT));
    assert_eq!(failure.failures[0].attempts, 3);
    assert!(failure.failures[0].error.contains("connection refused"));
    assert!(failure.failures[1].error.contains("503"));
    assert!(resolver.endpoint().is_none());
}

#[tokio::test]
async fn test_probe_requires_expected_field() {
    let target = Arc::new(ScriptedTarget::default());
    target.set(NODE_PORT, Behaviour::MissingField);
    target.set(TUNNEL, Behaviour::Healthy);
    let mut resolver = resolver(&target);

    let endpoint = resolver.resolve().await.unwrap();

    assert_eq!(endpoint.strategy, StrategyKind::Tunnel);
    assert_eq!(target.calls_to(NODE_PORT), 3);
}

#[tokio::test]
async fn test_ensure_keeps_endpoint_when_service_is_unhappy() {
    let target = Arc::new(ScriptedTarget::default());
    target.set(TUNNEL, Behaviour::Healthy);
    let mut resolver = resolver(&target);
    resolver.resolve().await.unwrap();
    let direct_calls = target.calls_to(NODE_PORT);

    target.set(TUNNEL, Behaviour::Unavailable);
    let endpoint = resolver.ensure().await.unwrap();

    assert_eq!(endpoint.strategy, StrategyKind::Tunnel);
    assert_eq!(target.calls_to(NODE_PORT), direct_calls);
}

#[tokio::test]
async fn test_ensure_re_resolves_on_connection_failure() {
    let target = Arc::new(ScriptedTarget::default());
    target.set(TUNNEL, Behaviour::Healthy);
    let mut resolver = resolver(&target);
    resolver.resolve().await.unwrap();

    target.set(TUNNEL, Behaviour::Refuse);
    target.set(NODE_PORT, Behaviour::Healthy);
    let endpoint = resolver.ensure().await.unwrap();

    assert_eq!(endpoint.strategy, StrategyKind::Direct);
    assert_eq!(resolver.endpoint(), Some(&endpoint));
}

struct BrokenLauncher;

#[async_trait]
impl PortForwardLauncher for BrokenLauncher {
    async fn launch(
        &self,
        service: &str,
        _local_port: u16,
        _remote_port: u16,
    ) -> Result<PortForwardHandle, PlatformError> {
        Err(PlatformError::PortForward(format!("no such service {}", service)))
    }
}

#[tokio::test]
async fn test_port_forward_launch_failure_is_reported() {
    let target = Arc::new(ScriptedTarget::default());
    let client: Arc<dyn TargetClient> = target.clone();
    let prober = Prober::new(client, &target_config());
    let strategies: Vec<Box<dyn scaleprobe_execution::ConnectionStrategy>> = vec![
        Box::new(UrlStrategy::direct(NODE_PORT)),
        Box::new(PortForwardStrategy::new(18080, 8000).spawning("factorial-service", Arc::new(BrokenLauncher))),
    ];
    let mut resolver = Resolver::new(strategies, prober);

    let failure = resolver.resolve().await.unwrap_err();

    assert_eq!(failure.failures.len(), 2);
    assert_eq!(failure.failures[1].attempts, 1);
    assert!(failure.failures[1].error.contains("no such service factorial-service"));
    // the forward never came up, so nothing was probed on its port
    assert_eq!(target.calls_to("http://127.0.0.1:18080"), 0);
}

#[cfg(unix)]
const FORWARD: &str = "http://127.0.0.1:18080";

/// Starts a stand-in `kubectl` and makes the forwarded port answer on every launch
#[cfg(unix)]
struct RelaunchingLauncher {
    kubectl: KubectlPlatform,
    target: Arc<ScriptedTarget>,
    launches: AtomicUsize,
}

#[cfg(unix)]
#[async_trait]
impl PortForwardLauncher for RelaunchingLauncher {
    async fn launch(
        &self,
        service: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Result<PortForwardHandle, PlatformError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let handle = self.kubectl.launch(service, local_port, remote_port).await?;
        self.target.set(FORWARD, Behaviour::Healthy);
        Ok(handle)
    }
}

#[cfg(unix)]
fn forward_resolver(
    dir: &std::path::Path,
    script: &str,
    target: &Arc<ScriptedTarget>,
) -> (Resolver, Arc<RelaunchingLauncher>) {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("kubectl");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

    let launcher = Arc::new(RelaunchingLauncher {
        kubectl: KubectlPlatform::new(
            path.to_string_lossy().into_owned(),
            "factorial",
            "factorial-service",
            "app=factorial-service",
            Duration::from_secs(5),
        ),
        target: target.clone(),
        launches: AtomicUsize::new(0),
    });
    let client: Arc<dyn TargetClient> = target.clone();
    let strategies: Vec<Box<dyn scaleprobe_execution::ConnectionStrategy>> = vec![Box::new(
        PortForwardStrategy::new(18080, 8000).spawning("factorial-service", launcher.clone()),
    )];
    (
        Resolver::new(strategies, Prober::new(client, &target_config())),
        launcher,
    )
}

#[cfg(unix)]
#[tokio::test]
async fn test_unresponsive_port_forward_is_relaunched() {
    let dir = tempfile::tempdir().unwrap();
    let target = Arc::new(ScriptedTarget::default());
    let (mut resolver, launcher) = forward_resolver(dir.path(), "sleep 60", &target);
    resolver.resolve().await.unwrap();
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);

    // the forward process is still running but the port no longer answers
    target.set(FORWARD, Behaviour::Refuse);
    let endpoint = resolver.ensure().await.unwrap();

    assert_eq!(endpoint.strategy, StrategyKind::PortForward);
    assert_eq!(endpoint.base_url, FORWARD);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_exited_port_forward_is_relaunched_before_probing() {
    let dir = tempfile::tempdir().unwrap();
    let target = Arc::new(ScriptedTarget::default());
    let (mut resolver, launcher) = forward_resolver(dir.path(), "sleep 1", &target);
    resolver.resolve().await.unwrap();

    tokio::time::sleep(Duration::from_millis(900)).await;
    target.set(FORWARD, Behaviour::Refuse);
    let before = target.calls_to(FORWARD);
    let endpoint = resolver.ensure().await.unwrap();

    assert_eq!(endpoint.strategy, StrategyKind::PortForward);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    // three refused checks of the cached endpoint, then one against the new forward
    assert_eq!(target.calls_to(FORWARD) - before, 4);
}
