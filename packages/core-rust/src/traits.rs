use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::{AdapterResult, StoreResult};
use crate::requests::{DeploymentRequest, WorkflowRequest};
use crate::types::{
    Capability, Deployment, DeploymentManager, Resource, ResourcePool, ResourceType, Subscription,
    WorkflowDescriptor, WorkflowExecution,
};

/// Minimal lifecycle contract shared by everything a registry manages.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Probe the backend. An error marks the registry entry unhealthy.
    async fn health(&self) -> anyhow::Result<()>;

    /// Release connections and other resources. Called once, at shutdown or removal.
    async fn close(&self) -> anyhow::Result<()>;

    /// Feature tags this backend supports.
    fn capabilities(&self) -> BTreeSet<Capability>;
}

/// Infrastructure inventory backend, one per target platform.
///
/// Every `create_*` must perform its existence check and insert as a single
/// atomic step and report a duplicate as `AdapterError::AlreadyExists`.
#[async_trait]
pub trait Adapter: Backend {
    async fn list_resource_pools(&self) -> AdapterResult<Vec<ResourcePool>>;
    async fn get_resource_pool(&self, id: &str) -> AdapterResult<ResourcePool>;
    async fn create_resource_pool(&self, pool: ResourcePool) -> AdapterResult<ResourcePool>;
    async fn update_resource_pool(&self, pool: ResourcePool) -> AdapterResult<ResourcePool>;
    async fn delete_resource_pool(&self, id: &str) -> AdapterResult<()>;

    async fn list_resources(&self) -> AdapterResult<Vec<Resource>>;
    async fn get_resource(&self, id: &str) -> AdapterResult<Resource>;
    async fn create_resource(&self, resource: Resource) -> AdapterResult<Resource>;
    async fn update_resource(&self, resource: Resource) -> AdapterResult<Resource>;
    async fn delete_resource(&self, id: &str) -> AdapterResult<()>;

    async fn list_resource_types(&self) -> AdapterResult<Vec<ResourceType>>;
    async fn get_resource_type(&self, id: &str) -> AdapterResult<ResourceType>;

    async fn list_deployment_managers(&self) -> AdapterResult<Vec<DeploymentManager>>;
    async fn get_deployment_manager(&self, id: &str) -> AdapterResult<DeploymentManager>;

    /// Register the subscription with the backend's own event source.
    async fn create_subscription(&self, subscription: Subscription) -> AdapterResult<Subscription>;
    async fn get_subscription(&self, id: &str) -> AdapterResult<Subscription>;
    async fn update_subscription(&self, subscription: Subscription) -> AdapterResult<Subscription>;
    async fn delete_subscription(&self, id: &str) -> AdapterResult<()>;
}

/// Persistence for subscription metadata, keyed by subscription id.
#[async_trait]
pub trait SubscriptionStore: Send + Sync + 'static {
    async fn create(&self, subscription: &Subscription) -> StoreResult<()>;
    async fn get(&self, id: &str) -> StoreResult<Subscription>;
    async fn update(&self, subscription: &Subscription) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
    async fn list(&self) -> StoreResult<Vec<Subscription>>;
    /// Connectivity check.
    async fn ping(&self) -> StoreResult<()>;
}

/// Deployment lifecycle backend (Helm, operator, VNF manager...).
#[async_trait]
pub trait DeploymentBackend: Backend {
    async fn list_deployments(&self) -> AdapterResult<Vec<Deployment>>;
    async fn get_deployment(&self, id: &str) -> AdapterResult<Deployment>;
    async fn create_deployment(&self, request: DeploymentRequest) -> AdapterResult<Deployment>;
    async fn delete_deployment(&self, id: &str) -> AdapterResult<()>;
}

/// Service-orchestration plugin exposing workflows to the SMO.
#[async_trait]
pub trait OrchestrationPlugin: Backend {
    async fn list_workflows(&self) -> AdapterResult<Vec<WorkflowDescriptor>>;
    async fn execute_workflow(
        &self,
        workflow: &str,
        request: WorkflowRequest,
    ) -> AdapterResult<WorkflowExecution>;
    async fn get_execution(&self, execution_id: &str) -> AdapterResult<WorkflowExecution>;
}
