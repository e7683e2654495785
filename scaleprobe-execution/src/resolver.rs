//! Connectivity resolution
//!
//! Strategies are tried in configured order and the first one whose probe
//! succeeds becomes the run's endpoint. The endpoint is re-checked before
//! every test, and only a connection-level failure sends the resolver back
//! through the strategy list.

use async_trait::async_trait;
use scaleprobe_config::{StrategyConfig, TargetConfig};
use scaleprobe_core::{Endpoint, ResolutionFailure, StrategyFailure, StrategyKind};
use scaleprobe_http::{check_probe_response, HttpError, TargetClient};
use scaleprobe_platform::{PortForwardHandle, PortForwardLauncher};
use scaleprobe_resilience::{RetryError, RetryExecutor, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Checks whether an endpoint answers the probe path
pub struct Prober {
    client: Arc<dyn TargetClient>,
    probe_path: String,
    expect_field: Option<String>,
    timeout: Duration,
    retry: RetryExecutor,
}

impl Prober {
    pub fn new(client: Arc<dyn TargetClient>, config: &TargetConfig) -> Self {
        Self {
            client,
            probe_path: config.probe_path.clone(),
            expect_field: config.probe_expect_field.clone(),
            timeout: config.probe_timeout,
            retry: RetryExecutor::new(RetryPolicy::from(&config.probe_retry)),
        }
    }

    /// Probe `endpoint`, retrying per the probe policy
    pub async fn probe(&self, endpoint: &Endpoint) -> Result<(), RetryError<HttpError>> {
        let url = endpoint.url_for(&self.probe_path);
        let client = &self.client;
        let url = url.as_str();
        let expect_field = self.expect_field.as_deref();
        let timeout = self.timeout;

        self.retry
            .execute(move || async move {
                let response = client.get(url, timeout).await?;
                check_probe_response(&response, url, expect_field)
            })
            .await
    }
}

/// One way of reaching the target service
#[async_trait]
pub trait ConnectionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Human-readable name used in logs and failure reports
    fn name(&self) -> String;

    /// Make the strategy usable and probe it
    async fn attempt(&mut self, prober: &Prober) -> Result<Endpoint, StrategyFailure>;
}

fn probe_failure(name: String, err: RetryError<HttpError>) -> StrategyFailure {
    StrategyFailure {
        strategy: name,
        attempts: err.attempts(),
        error: err.last_error().to_string(),
    }
}

/// A fixed URL: a cluster node port or a load-balancer tunnel
pub struct UrlStrategy {
    kind: StrategyKind,
    url: String,
}

impl UrlStrategy {
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::Direct,
            url: url.into(),
        }
    }

    pub fn tunnel(url: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::Tunnel,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ConnectionStrategy for UrlStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn name(&self) -> String {
        format!("{} {}", self.kind, self.url)
    }

    async fn attempt(&mut self, prober: &Prober) -> Result<Endpoint, StrategyFailure> {
        let endpoint = Endpoint::new(self.url.clone(), self.kind);
        prober
            .probe(&endpoint)
            .await
            .map(|_| endpoint)
            .map_err(|e| probe_failure(self.name(), e))
    }
}

/// A local port forwarded to the service, optionally started by the harness
pub struct PortForwardStrategy {
    local_port: u16,
    remote_port: u16,
    service: Option<String>,
    launcher: Option<Arc<dyn PortForwardLauncher>>,
    handle: Option<PortForwardHandle>,
}

impl PortForwardStrategy {
    pub fn new(local_port: u16, remote_port: u16) -> Self {
        Self {
            local_port,
            remote_port,
            service: None,
            launcher: None,
            handle: None,
        }
    }

    /// Launch a forward to `service` before probing
    pub fn spawning(mut self, service: impl Into<String>, launcher: Arc<dyn PortForwardLauncher>) -> Self {
        self.service = Some(service.into());
        self.launcher = Some(launcher);
        self
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.local_port)
    }
}

#[async_trait]
impl ConnectionStrategy for PortForwardStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PortForward
    }

    fn name(&self) -> String {
        match &self.service {
            Some(service) => format!("port_forward svc/{} -> {}", service, self.base_url()),
            None => format!("port_forward {}", self.base_url()),
        }
    }

    async fn attempt(&mut self, prober: &Prober) -> Result<Endpoint, StrategyFailure> {
        if let Some(handle) = self.handle.as_mut() {
            if !handle.is_alive() {
                warn!("Port forward on {} has exited; relaunching", self.local_port);
                self.handle = None;
            }
        }
        let launched_now = self.launch_if_needed().await?;

        let endpoint = Endpoint::new(self.base_url(), StrategyKind::PortForward);
        let err = match prober.probe(&endpoint).await {
            Ok(()) => return Ok(endpoint),
            Err(e) => e,
        };

        // an older forward may be wedged while its process lives on
        self.handle = None;
        if launched_now || self.launcher.is_none() {
            return Err(probe_failure(self.name(), err));
        }
        warn!(
            "Port forward on {} stopped answering ({}); relaunching",
            self.local_port,
            err.last_error()
        );
        self.launch_if_needed().await?;
        match prober.probe(&endpoint).await {
            Ok(()) => Ok(endpoint),
            Err(e) => {
                self.handle = None;
                Err(probe_failure(self.name(), e))
            }
        }
    }
}

impl PortForwardStrategy {
    /// Start the forward when the strategy owns one and none is running.
    /// Returns whether a new forward was started.
    async fn launch_if_needed(&mut self) -> Result<bool, StrategyFailure> {
        if self.handle.is_some() {
            return Ok(false);
        }
        let (Some(launcher), Some(service)) = (&self.launcher, &self.service) else {
            return Ok(false);
        };
        let handle = launcher
            .launch(service, self.local_port, self.remote_port)
            .await
            .map_err(|e| StrategyFailure {
                strategy: self.name(),
                attempts: 1,
                error: e.to_string(),
            })?;
        debug!("Port forward listening on {}", handle.local_port);
        self.handle = Some(handle);
        Ok(true)
    }
}

/// Build one strategy per configured entry
pub fn strategies_from_config(
    config: &TargetConfig,
    launcher: Option<Arc<dyn PortForwardLauncher>>,
) -> Vec<Box<dyn ConnectionStrategy>> {
    config
        .strategies
        .iter()
        .map(|strategy| -> Box<dyn ConnectionStrategy> {
            match strategy {
                StrategyConfig::Direct { url } => Box::new(UrlStrategy::direct(url.clone())),
                StrategyConfig::Tunnel { url } => Box::new(UrlStrategy::tunnel(url.clone())),
                StrategyConfig::PortForward {
                    local_port,
                    remote_port,
                    service,
                    spawn,
                } => {
                    let forward = PortForwardStrategy::new(*local_port, *remote_port);
                    match (spawn, service, &launcher) {
                        (true, Some(service), Some(launcher)) => {
                            Box::new(forward.spawning(service.clone(), Arc::clone(launcher)))
                        }
                        (true, _, None) => {
                            warn!("Port forward spawning requested but no launcher is available; probing only");
                            Box::new(forward)
                        }
                        _ => Box::new(forward),
                    }
                }
            }
        })
        .collect()
}

/// Finds and keeps a working endpoint for the run
pub struct Resolver {
    strategies: Vec<Box<dyn ConnectionStrategy>>,
    prober: Prober,
    current: Option<Endpoint>,
}

impl Resolver {
    pub fn new(strategies: Vec<Box<dyn ConnectionStrategy>>, prober: Prober) -> Self {
        Self {
            strategies,
            prober,
            current: None,
        }
    }

    pub fn from_config(
        config: &TargetConfig,
        client: Arc<dyn TargetClient>,
        launcher: Option<Arc<dyn PortForwardLauncher>>,
    ) -> Self {
        Self::new(
            strategies_from_config(config, launcher),
            Prober::new(client, config),
        )
    }

    /// Cached endpoint, if one has been resolved
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.current.as_ref()
    }

    /// Try every strategy in order and cache the first that answers
    pub async fn resolve(&mut self) -> Result<Endpoint, ResolutionFailure> {
        let mut failures = Vec::with_capacity(self.strategies.len());

        for strategy in self.strategies.iter_mut() {
            info!("Trying connectivity strategy {}", strategy.name());
            match strategy.attempt(&self.prober).await {
                Ok(endpoint) => {
                    info!(
                        strategy = %endpoint.strategy,
                        url = %endpoint.base_url,
                        "Target reachable"
                    );
                    self.current = Some(endpoint.clone());
                    return Ok(endpoint);
                }
                Err(failure) => {
                    warn!(
                        "Strategy {} failed after {} attempts: {}",
                        failure.strategy, failure.attempts, failure.error
                    );
                    failures.push(failure);
                }
            }
        }

        self.current = None;
        Err(ResolutionFailure { failures })
    }

    /// Re-check the cached endpoint, re-resolving only when it is unreachable
    pub async fn ensure(&mut self) -> Result<Endpoint, ResolutionFailure> {
        let Some(endpoint) = self.current.clone() else {
            return self.resolve().await;
        };

        match self.prober.probe(&endpoint).await {
            Ok(()) => Ok(endpoint),
            Err(e) if e.last_error().is_connection_level() => {
                warn!(
                    "Endpoint {} is no longer reachable ({}); re-resolving",
                    endpoint.base_url,
                    e.last_error()
                );
                self.current = None;
                self.resolve().await
            }
            Err(e) => {
                warn!(
                    "Endpoint {} reachable but probe failed ({}); keeping it",
                    endpoint.base_url,
                    e.last_error()
                );
                Ok(endpoint)
            }
        }
    }
}
