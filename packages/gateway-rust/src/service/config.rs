//! Gateway configuration.
//!
//! Plain structs with `Default` impls; the binary fills them from CLI
//! arguments and environment variables.

use std::time::Duration;

use ocloud_core::ApiVersion;

use crate::network::NetworkConfig;
use crate::service::callback::{default_blocked_ranges, IpRange};

/// Top-level configuration for the whole gateway.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub network: NetworkConfig,
    pub api: ApiConfig,
    pub tenancy: TenancyConfig,
    pub registry: RegistryConfig,
    pub batch: BatchConfig,
    pub callbacks: CallbackConfig,
}

/// API surface layout and the version lifecycle table.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// First path segment of the infrastructure inventory surface.
    pub ims_base: String,
    /// First path segment of the deployment management surface.
    pub dms_base: String,
    /// First path segment of the orchestration plugin surface.
    pub smo_base: String,
    /// Version applied when a request path carries no `v<digits>` segment.
    pub default_version: String,
    /// Every version the gateway knows about, including sunset ones.
    pub versions: Vec<ApiVersion>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            ims_base: "o2ims-infrastructureInventory".to_string(),
            dms_base: "o2dms".to_string(),
            smo_base: "o2smo".to_string(),
            default_version: "v1".to_string(),
            versions: vec![ApiVersion::stable("v1")],
        }
    }
}

/// How the tenant of a request is determined.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    pub tenant_header: String,
    pub tenant_query_param: String,
    /// Header carrying the platform-admin token.
    pub admin_header: String,
    /// When unset, no request is treated as platform admin.
    pub admin_token: Option<String>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            tenant_header: "X-Tenant-ID".to_string(),
            tenant_query_param: "tenantId".to_string(),
            admin_header: "X-Platform-Admin-Token".to_string(),
            admin_token: None,
        }
    }
}

/// Background health checking for every registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub health_interval: Duration,
    /// A probe running longer than this counts as a failure.
    pub probe_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_items: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_items: 100 }
    }
}

/// Subscription callback restrictions.
#[derive(Debug, Clone)]
pub struct CallbackConfig {
    /// Callback hosts resolving into any of these ranges are rejected.
    pub blocked_ranges: Vec<IpRange>,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            blocked_ranges: default_blocked_ranges(),
        }
    }
}
