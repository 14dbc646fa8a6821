//! Domain layer: everything between the HTTP handlers and the backends.
//!
//! - **Inventory engine** (`inventory`, `subscriptions`): resource, pool and
//!   subscription rules on top of the default adapter
//! - **Callback validation** (`callback`): SSRF guard for subscriptions
//! - **Batch executor** (`batch`): ordered multi-item operations with
//!   saga-style compensation
//! - **Deployment and plugin dispatch** (`deployments`, `plugins`):
//!   registry lookups for the DMS and SMO surfaces
//! - **Error taxonomy** (`error`) and **configuration** (`config`)

pub mod batch;
pub mod callback;
pub mod config;
pub mod deployments;
pub mod error;
pub mod inventory;
pub mod plugins;
pub mod subscriptions;

use std::sync::Arc;

use ocloud_core::{Adapter, DeploymentBackend, OrchestrationPlugin, SubscriptionStore};
use tracing::info;

pub use batch::{BatchCollection, BatchExecutor, BatchItemResult, BatchOutcome};
pub use callback::{CallbackError, CallbackValidator, HostResolver, IpRange, SystemResolver};
pub use config::{ApiConfig, BatchConfig, CallbackConfig, GatewayConfig, RegistryConfig, TenancyConfig};
pub use deployments::DeploymentService;
pub use error::{ApiError, ProblemDetails};
pub use inventory::{InventoryService, ResourceQuery};
pub use plugins::PluginService;

use crate::registry::Registry;

/// The three backend registries of a gateway.
#[derive(Clone)]
pub struct Registries {
    pub adapters: Arc<Registry<dyn Adapter>>,
    pub deployments: Arc<Registry<dyn DeploymentBackend>>,
    pub plugins: Arc<Registry<dyn OrchestrationPlugin>>,
}

impl Registries {
    /// Empty registries, ready for `register`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: Arc::new(Registry::new("adapter")),
            deployments: Arc::new(Registry::new("deployment backend")),
            plugins: Arc::new(Registry::new("plugin")),
        }
    }

    /// Probes every registry once, then starts the periodic checks.
    pub async fn start_health_checks(&self, config: &RegistryConfig) {
        self.adapters.probe_now(config.probe_timeout).await;
        self.deployments.probe_now(config.probe_timeout).await;
        self.plugins.probe_now(config.probe_timeout).await;

        self.adapters
            .start_health_checks(config.health_interval, config.probe_timeout);
        self.deployments
            .start_health_checks(config.health_interval, config.probe_timeout);
        self.plugins
            .start_health_checks(config.health_interval, config.probe_timeout);
        info!(interval = ?config.health_interval, "registry health checks started");
    }

    pub async fn stop_health_checks(&self) {
        self.adapters.stop_health_checks().await;
        self.deployments.stop_health_checks().await;
        self.plugins.stop_health_checks().await;
    }

    /// Refuses new lookups on every registry.
    pub fn seal(&self) {
        self.adapters.seal();
        self.deployments.seal();
        self.plugins.seal();
    }

    /// Releases every backend. Idempotent.
    pub async fn close(&self) {
        self.adapters.close().await;
        self.deployments.close().await;
        self.plugins.close().await;
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

/// Every domain service, wired to one set of registries.
#[derive(Clone)]
pub struct Services {
    pub registries: Registries,
    pub inventory: Arc<InventoryService>,
    pub batch: Arc<BatchExecutor>,
    pub deployments: Arc<DeploymentService>,
    pub plugins: Arc<PluginService>,
}

impl Services {
    #[must_use]
    pub fn new(
        config: &GatewayConfig,
        registries: Registries,
        store: Arc<dyn SubscriptionStore>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        let callbacks = Arc::new(CallbackValidator::new(
            config.callbacks.blocked_ranges.clone(),
            resolver,
        ));
        let inventory = Arc::new(InventoryService::new(
            Arc::clone(&registries.adapters),
            store,
            callbacks,
        ));
        let batch = Arc::new(BatchExecutor::new(
            Arc::clone(&inventory),
            config.batch.max_items,
        ));
        let deployments = Arc::new(DeploymentService::new(Arc::clone(&registries.deployments)));
        let plugins = Arc::new(PluginService::new(Arc::clone(&registries.plugins)));

        Self {
            registries,
            inventory,
            batch,
            deployments,
            plugins,
        }
    }
}
