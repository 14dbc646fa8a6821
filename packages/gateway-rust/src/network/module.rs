//! Network module with deferred startup lifecycle.
//!
//! `new()` assembles shared state, `start()` binds the listener, and
//! `serve()` accepts connections until shutdown, then runs the ordered
//! teardown: stop health checks, seal registries, drain, close backends.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    batch, deployments, health, inventory, plugins, subscriptions, versions, AppState,
};
use super::load_shed::LoadShedLayer;
use super::middleware::{build_http_layers, track_in_flight};
use super::shutdown::ShutdownController;
use super::tenant::tenant_middleware;
use super::version::{version_middleware, VersionTable};
use crate::service::{ApiError, GatewayConfig, Registries, Services};

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Inventory routes, relative to `/{ims}[/{version}]`.
fn ims_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/resources",
            get(inventory::list_resources).post(inventory::create_resource),
        )
        .route(
            "/resources/{id}",
            get(inventory::get_resource)
                .put(inventory::update_resource)
                .delete(inventory::delete_resource),
        )
        .route(
            "/resourcePools",
            get(inventory::list_resource_pools).post(inventory::create_resource_pool),
        )
        .route(
            "/resourcePools/{id}",
            get(inventory::get_resource_pool)
                .put(inventory::update_resource_pool)
                .delete(inventory::delete_resource_pool),
        )
        .route("/resourceTypes", get(inventory::list_resource_types))
        .route("/resourceTypes/{id}", get(inventory::get_resource_type))
        .route("/deploymentManagers", get(inventory::list_deployment_managers))
        .route(
            "/deploymentManagers/{id}",
            get(inventory::get_deployment_manager),
        )
        .route(
            "/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::create_subscription),
        )
        .route(
            "/subscriptions/{id}",
            get(subscriptions::get_subscription)
                .put(subscriptions::update_subscription)
                .delete(subscriptions::delete_subscription),
        )
        .route("/adapters", get(inventory::list_adapters))
        .route("/batch/{collection}", post(batch::batch_create))
        .route("/batch/{collection}/delete", post(batch::batch_delete))
}

fn dms_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/deployments",
            get(deployments::list_deployments).post(deployments::create_deployment),
        )
        .route(
            "/deployments/{id}",
            get(deployments::get_deployment).delete(deployments::delete_deployment),
        )
        .route("/backends", get(deployments::list_backends))
}

fn smo_routes() -> Router<AppState> {
    Router::new()
        .route("/plugins", get(plugins::list_plugins))
        .route("/plugins/{name}/workflows", get(plugins::list_workflows))
        .route(
            "/plugins/{name}/workflows/{workflow}/executions",
            post(plugins::execute_workflow),
        )
        .route(
            "/plugins/{name}/executions/{id}",
            get(plugins::get_execution),
        )
}

/// Mounts `routes` under `/{base}/{version}` for every configured version,
/// and under `/{base}` for the default version.
fn versioned(base: &str, table: &VersionTable, routes: Router<AppState>) -> Router<AppState> {
    table
        .versions()
        .iter()
        .fold(Router::new(), |router, version| {
            router.nest(&format!("/{base}/{}", version.version), routes.clone())
        })
        .nest(&format!("/{base}"), routes)
}

async fn unknown_route() -> ApiError {
    ApiError::NotFound("no such endpoint".to_string())
}

/// Assembles every route with its middleware.
///
/// Outer to inner on the API surface: transport layers, in-flight
/// tracking, load shedding, version gating, then tenant resolution on the
/// inventory routes only. Health and version discovery skip everything but
/// the transport layers.
pub fn build_router(state: AppState, network: &NetworkConfig) -> Router {
    let api = Arc::clone(&state.api);
    let table = Arc::clone(&state.versions);
    let transport = build_http_layers(network, &state.tenancy.tenant_header);

    let ims = ims_routes().layer(from_fn_with_state(
        Arc::clone(&state.tenancy),
        tenant_middleware,
    ));

    let gated = Router::new()
        .merge(versioned(&api.ims_base, &table, ims))
        .merge(versioned(&api.dms_base, &table, dms_routes()))
        .merge(versioned(&api.smo_base, &table, smo_routes()))
        .fallback(unknown_route)
        .layer(from_fn_with_state(Arc::clone(&table), version_middleware))
        .layer(LoadShedLayer::new(network.max_concurrent_requests))
        .layer(from_fn_with_state(
            Arc::clone(&state.shutdown),
            track_in_flight,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/health/live", get(health::liveness_handler))
        .route("/health/ready", get(health::readiness_handler))
        .route(
            &format!("/{}/api_versions", api.ims_base),
            get(versions::list_versions),
        )
        .merge(gated)
        .layer(transport)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// NetworkModule
// ---------------------------------------------------------------------------

/// Owns the listener and the state shared by every request.
pub struct NetworkModule {
    config: NetworkConfig,
    drain_timeout: std::time::Duration,
    state: AppState,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Builds shared state without binding any port.
    ///
    /// # Errors
    ///
    /// Fails when the API version table is inconsistent.
    pub fn new(config: &GatewayConfig, services: Services) -> anyhow::Result<Self> {
        let versions = VersionTable::new(config.api.versions.clone(), &config.api.default_version)?;
        let state = AppState {
            services,
            versions: Arc::new(versions),
            api: Arc::new(config.api.clone()),
            tenancy: Arc::new(config.tenancy.clone()),
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        };
        Ok(Self {
            config: config.network.clone(),
            drain_timeout: config.network.drain_timeout,
            state,
            listener: None,
        })
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    #[must_use]
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Binds the configured address and returns the bound port (useful
    /// with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then tears down in order.
    ///
    /// # Errors
    ///
    /// Fails when `start()` was not called, TLS material cannot be loaded,
    /// or the server hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = build_router(self.state.clone(), &self.config);
        let registries = self.state.services.registries.clone();
        let controller = Arc::clone(&self.state.shutdown);

        // Runs when the signal fires, before the server stops accepting.
        let begin_shutdown = {
            let registries = registries.clone();
            let controller = Arc::clone(&controller);
            async move {
                shutdown.await;
                info!("shutdown signal received");
                registries.stop_health_checks().await;
                registries.seal();
                controller.trigger_shutdown();
            }
        };

        controller.set_ready();
        info!("gateway ready");

        let served = match self.config.tls {
            Some(ref tls) => serve_tls(listener, router, tls, begin_shutdown).await,
            None => serve_plain(listener, router, begin_shutdown).await,
        };

        finish_shutdown(&registries, &controller, self.drain_timeout).await;
        served
    }
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("serving plain HTTP");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificate or key: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let trigger = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        trigger.graceful_shutdown(None);
    });

    info!(%addr, "serving HTTPS");
    axum_server::from_tcp_rustls(std_listener, rustls)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

/// Waits for in-flight requests, then releases every backend.
async fn finish_shutdown(
    registries: &Registries,
    controller: &ShutdownController,
    drain_timeout: std::time::Duration,
) {
    // A server error can end serving without the signal having fired.
    registries.stop_health_checks().await;
    registries.seal();
    controller.trigger_shutdown();

    if controller.wait_for_drain(drain_timeout).await {
        info!("in-flight requests drained");
    } else {
        warn!(
            remaining = controller.in_flight_count(),
            "drain timeout expired with requests still in flight"
        );
    }
    registries.close().await;
    info!("backends closed");
}
