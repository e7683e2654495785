//! Cooperative run stop signal
//!
//! A triggered signal never aborts work in flight. The orchestrator checks
//! it between tests so the current row is always written first.

use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable stop flag shared between the signal listener and the run loop
#[derive(Debug, Clone)]
pub struct StopSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request a stop; repeated calls are no-ops
    pub fn trigger(&self) {
        self.sender.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the signal has been triggered
    pub async fn triggered(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = receiver.wait_for(|stopped| *stopped).await;
    }

    /// Trigger the signal on the first ctrl-c
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received; stopping after the current test");
                    signal.trigger();
                }
                Err(e) => warn!("Unable to listen for ctrl-c: {}", e),
            }
        })
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
