//! Periodic health-check loop for a [`Registry`].
//!
//! The loop holds only a `Weak` reference so a dropped registry ends it.

use std::sync::Weak;
use std::time::Duration;

use ocloud_core::Backend;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::Registry;

/// Handle to a running health-check task.
pub(super) struct HealthChecker {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HealthChecker {
    /// Spawns the loop. The first pass runs immediately.
    pub(super) fn start<B>(
        registry: Weak<Registry<B>>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self
    where
        B: ?Sized + Backend,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A slow pass must not cause a burst of catch-up passes.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let Some(registry) = registry.upgrade() else { break };
                        tokio::select! {
                            _ = &mut shutdown_rx => break,
                            () = registry.probe_now(probe_timeout) => {}
                        }
                    }
                }
            }
            debug!("health check loop stopped");
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Signals the loop and waits for it to exit.
    pub(super) async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
