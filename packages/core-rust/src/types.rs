//! Inventory, deployment, and orchestration data model.
//!
//! All structs use `#[serde(rename_all = "camelCase")]` so the JSON bodies
//! match the O-RAN O2 interface field names (`resourceId`, `resourcePoolId`,
//! `consumerSubscriptionId`, ...).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form vendor extensions attached to inventory objects.
///
/// Uses `BTreeMap` for deterministic serialization order.
pub type Extensions = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Feature tag declared by a backend when it is registered.
///
/// The dispatch layer checks the tag set of a registry entry before routing
/// a request to that backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Resources,
    ResourcePools,
    ResourceTypes,
    DeploymentManagers,
    Subscriptions,
    Deployments,
    Workflows,
}

impl Capability {
    /// Wire name of the capability, as rendered in JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resources => "resources",
            Self::ResourcePools => "resourcePools",
            Self::ResourceTypes => "resourceTypes",
            Self::DeploymentManagers => "deploymentManagers",
            Self::Subscriptions => "subscriptions",
            Self::Deployments => "deployments",
            Self::Workflows => "workflows",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Infrastructure inventory
// ---------------------------------------------------------------------------

/// A single physical or logical infrastructure resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Unique identifier within the owning backend.
    pub resource_id: String,
    /// Type of the resource. Immutable once set.
    pub resource_type_id: String,
    /// Pool the resource belongs to. Immutable once set.
    pub resource_pool_id: String,
    #[serde(default)]
    pub description: String,
    /// Globally unique asset URN (`urn:<nid>:<nss>`).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub global_asset_id: Option<String>,
    #[serde(skip_serializing_if = "Extensions::is_empty", default)]
    pub extensions: Extensions,
    /// Tenant that created the resource. `None` means the default tenant.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tenant_id: Option<String>,
}

/// A named grouping of resources, typically one site or cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePool {
    pub resource_pool_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Extensions::is_empty", default)]
    pub extensions: Extensions,
}

/// Descriptor for a class of resources (read-only through the gateway).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    pub resource_type_id: String,
    pub name: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
}

/// A deployment manager exposed by the O-Cloud (read-only through the gateway).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManager {
    pub deployment_manager_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Endpoint of the deployment management service.
    pub service_uri: String,
    #[serde(skip_serializing_if = "Extensions::is_empty", default)]
    pub extensions: Extensions,
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Match predicates restricting which inventory events a subscriber receives.
///
/// Each list is an OR over its values; non-empty lists are ANDed together.
/// A filter with every list empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_pool_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_type_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_ids: Vec<String>,
}

impl SubscriptionFilter {
    /// Returns `true` when no predicate is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resource_pool_ids.is_empty()
            && self.resource_type_ids.is_empty()
            && self.resource_ids.is_empty()
    }

    /// Checks whether an event about `resource` passes this filter.
    #[must_use]
    pub fn matches(&self, resource: &Resource) -> bool {
        fn admits(list: &[String], value: &str) -> bool {
            list.is_empty() || list.iter().any(|v| v == value)
        }
        admits(&self.resource_pool_ids, &resource.resource_pool_id)
            && admits(&self.resource_type_ids, &resource.resource_type_id)
            && admits(&self.resource_ids, &resource.resource_id)
    }
}

/// Inventory change subscription registered by an SMO consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    /// Validated notification endpoint.
    pub callback: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub consumer_subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<SubscriptionFilter>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tenant_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Deployment lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of a deployment as reported by its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeploymentStatus {
    Pending,
    Deploying,
    Deployed,
    Failed,
    Deleting,
}

/// A workload deployed through a deployment backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub deployment_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Reference to the package (chart, descriptor) being deployed.
    pub package_ref: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub namespace: Option<String>,
    pub status: DeploymentStatus,
    /// Backend-specific input values.
    #[serde(default)]
    pub values: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Orchestration workflows
// ---------------------------------------------------------------------------

/// A workflow offered by an orchestration plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// State of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// One run of a plugin workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub execution_id: String,
    pub workflow: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finished_at: Option<DateTime<Utc>>,
}
