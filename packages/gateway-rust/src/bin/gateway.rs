//! `ocloud-gateway` binary: parses configuration, boots the in-memory
//! backends, and serves until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use ocloud_core::ApiVersion;
use ocloud_gateway::network::{NetworkConfig, NetworkModule, TlsConfig};
use ocloud_gateway::service::{
    ApiConfig, BatchConfig, CallbackConfig, GatewayConfig, IpRange, Registries, RegistryConfig,
    Services, SystemResolver, TenancyConfig,
};
use ocloud_gateway::storage::{MemoryAdapter, MemoryDeploymentBackend, MemorySubscriptionStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// O-Cloud gateway
#[derive(Debug, Parser)]
#[command(name = "ocloud-gateway", version)]
struct Args {
    #[arg(long, env = "OCLOUD_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "OCLOUD_PORT", default_value_t = 8080)]
    port: u16,

    /// PEM certificate; HTTPS is served when both cert and key are given.
    #[arg(long, env = "OCLOUD_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    #[arg(long, env = "OCLOUD_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    #[arg(long, env = "OCLOUD_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    #[arg(long, env = "OCLOUD_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, env = "OCLOUD_MAX_CONCURRENT_REQUESTS", default_value_t = 1024)]
    max_concurrent_requests: usize,

    #[arg(long, env = "OCLOUD_DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    drain_timeout_secs: u64,

    #[arg(long, env = "OCLOUD_IMS_BASE", default_value = "o2ims-infrastructureInventory")]
    ims_base: String,

    #[arg(long, env = "OCLOUD_DMS_BASE", default_value = "o2dms")]
    dms_base: String,

    #[arg(long, env = "OCLOUD_SMO_BASE", default_value = "o2smo")]
    smo_base: String,

    /// Repeatable: `v1:stable`, `v2:deprecated[:YYYY-MM-DD[:notice]]`, `v0:sunset`.
    #[arg(
        long = "api-version",
        env = "OCLOUD_API_VERSIONS",
        value_delimiter = ',',
        default_value = "v1:stable"
    )]
    api_versions: Vec<ApiVersion>,

    #[arg(long, env = "OCLOUD_DEFAULT_API_VERSION", default_value = "v1")]
    default_api_version: String,

    /// Requests presenting this token in `X-Platform-Admin-Token` see every tenant.
    #[arg(long, env = "OCLOUD_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    #[arg(
        long,
        env = "OCLOUD_HEALTH_INTERVAL_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    health_interval_secs: u64,

    #[arg(long, env = "OCLOUD_PROBE_TIMEOUT_SECS", default_value_t = 5)]
    probe_timeout_secs: u64,

    #[arg(long, env = "OCLOUD_BATCH_MAX_ITEMS", default_value_t = 100)]
    batch_max_items: usize,

    /// Replaces the built-in private and loopback list when given.
    #[arg(long = "blocked-range", env = "OCLOUD_BLOCKED_RANGES", value_delimiter = ',')]
    blocked_ranges: Vec<IpRange>,

    #[arg(long, env = "OCLOUD_LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

impl Args {
    fn into_config(self) -> GatewayConfig {
        let tls = match (self.tls_cert, self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path,
                key_path,
            }),
            _ => None,
        };
        let callbacks = if self.blocked_ranges.is_empty() {
            CallbackConfig::default()
        } else {
            CallbackConfig {
                blocked_ranges: self.blocked_ranges,
            }
        };

        GatewayConfig {
            network: NetworkConfig {
                host: self.host,
                port: self.port,
                tls,
                cors_origins: self.cors_origins,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                max_concurrent_requests: self.max_concurrent_requests,
                drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            },
            api: ApiConfig {
                ims_base: self.ims_base,
                dms_base: self.dms_base,
                smo_base: self.smo_base,
                default_version: self.default_api_version,
                versions: self.api_versions,
            },
            tenancy: TenancyConfig {
                admin_token: self.admin_token,
                ..TenancyConfig::default()
            },
            registry: RegistryConfig {
                health_interval: Duration::from_secs(self.health_interval_secs),
                probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            },
            batch: BatchConfig {
                max_items: self.batch_max_items,
            },
            callbacks,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);
    let config = args.into_config();

    let registries = Registries::new();
    registries
        .adapters
        .register_backend("memory", Arc::new(MemoryAdapter::new()), true)
        .context("registering in-memory adapter")?;
    registries
        .deployments
        .register_backend("memory", Arc::new(MemoryDeploymentBackend::new()), true)
        .context("registering in-memory deployment backend")?;

    let services = Services::new(
        &config,
        registries.clone(),
        Arc::new(MemorySubscriptionStore::new()),
        Arc::new(SystemResolver),
    );
    let mut module = NetworkModule::new(&config, services)?;

    registries.start_health_checks(&config.registry).await;
    let port = module.start().await?;
    info!(port, versions = config.api.versions.len(), "gateway starting");

    module.serve(shutdown_signal()).await
}
