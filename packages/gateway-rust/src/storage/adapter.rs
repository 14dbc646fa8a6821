//! In-memory inventory adapter.
//!
//! Reference implementation of the [`Adapter`] contract. Used by the binary
//! when no external platform is configured and by tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ocloud_core::{
    Adapter, AdapterError, AdapterResult, Backend, Capability, DeploymentManager, ObjectKind,
    Resource, ResourcePool, ResourceType, Subscription,
};

use crate::storage::table::{Table, TableError};

fn table_error(kind: ObjectKind, id: &str, err: TableError) -> AdapterError {
    match err {
        TableError::Exists => AdapterError::already_exists(kind, id),
        TableError::Missing => AdapterError::not_found(kind, id),
    }
}

/// Inventory held entirely in process memory.
pub struct MemoryAdapter {
    pools: Table<ResourcePool>,
    resources: Table<Resource>,
    resource_types: Table<ResourceType>,
    deployment_managers: Table<DeploymentManager>,
    subscriptions: Table<Subscription>,
    capabilities: BTreeSet<Capability>,
    healthy: AtomicBool,
    closed: AtomicBool,
}

impl MemoryAdapter {
    /// An empty adapter declaring every inventory capability.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(BTreeSet::from([
            Capability::Resources,
            Capability::ResourcePools,
            Capability::ResourceTypes,
            Capability::DeploymentManagers,
            Capability::Subscriptions,
        ]))
    }

    #[must_use]
    pub fn with_capabilities(capabilities: BTreeSet<Capability>) -> Self {
        Self {
            pools: Table::new(),
            resources: Table::new(),
            resource_types: Table::new(),
            deployment_managers: Table::new(),
            subscriptions: Table::new(),
            capabilities,
            healthy: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Seeds a read-only resource type.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the id was seeded before.
    pub fn with_resource_type(self, resource_type: ResourceType) -> AdapterResult<Self> {
        let id = resource_type.resource_type_id.clone();
        self.resource_types
            .insert_new(&id, resource_type)
            .map_err(|e| table_error(ObjectKind::ResourceType, &id, e))?;
        Ok(self)
    }

    /// Seeds a read-only deployment manager.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the id was seeded before.
    pub fn with_deployment_manager(self, manager: DeploymentManager) -> AdapterResult<Self> {
        let id = manager.deployment_manager_id.clone();
        self.deployment_managers
            .insert_new(&id, manager)
            .map_err(|e| table_error(ObjectKind::DeploymentManager, &id, e))?;
        Ok(self)
    }

    /// Makes subsequent health probes fail (or succeed again).
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryAdapter {
    async fn health(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.closed.load(Ordering::SeqCst), "adapter is closed");
        anyhow::ensure!(self.healthy.load(Ordering::SeqCst), "adapter reported unhealthy");
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn capabilities(&self) -> BTreeSet<Capability> {
        self.capabilities.clone()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn list_resource_pools(&self) -> AdapterResult<Vec<ResourcePool>> {
        Ok(self.pools.list())
    }

    async fn get_resource_pool(&self, id: &str) -> AdapterResult<ResourcePool> {
        self.pools
            .get(id)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::ResourcePool, id))
    }

    async fn create_resource_pool(&self, pool: ResourcePool) -> AdapterResult<ResourcePool> {
        let id = pool.resource_pool_id.clone();
        self.pools
            .insert_new(&id, pool)
            .map_err(|e| table_error(ObjectKind::ResourcePool, &id, e))
    }

    async fn update_resource_pool(&self, pool: ResourcePool) -> AdapterResult<ResourcePool> {
        let id = pool.resource_pool_id.clone();
        self.pools
            .replace(&id, pool)
            .map_err(|e| table_error(ObjectKind::ResourcePool, &id, e))
    }

    async fn delete_resource_pool(&self, id: &str) -> AdapterResult<()> {
        self.pools
            .remove(id)
            .map(drop)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::ResourcePool, id))
    }

    async fn list_resources(&self) -> AdapterResult<Vec<Resource>> {
        Ok(self.resources.list())
    }

    async fn get_resource(&self, id: &str) -> AdapterResult<Resource> {
        self.resources
            .get(id)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::Resource, id))
    }

    async fn create_resource(&self, resource: Resource) -> AdapterResult<Resource> {
        let id = resource.resource_id.clone();
        self.resources
            .insert_new(&id, resource)
            .map_err(|e| table_error(ObjectKind::Resource, &id, e))
    }

    async fn update_resource(&self, resource: Resource) -> AdapterResult<Resource> {
        let id = resource.resource_id.clone();
        self.resources
            .replace(&id, resource)
            .map_err(|e| table_error(ObjectKind::Resource, &id, e))
    }

    async fn delete_resource(&self, id: &str) -> AdapterResult<()> {
        self.resources
            .remove(id)
            .map(drop)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::Resource, id))
    }

    async fn list_resource_types(&self) -> AdapterResult<Vec<ResourceType>> {
        Ok(self.resource_types.list())
    }

    async fn get_resource_type(&self, id: &str) -> AdapterResult<ResourceType> {
        self.resource_types
            .get(id)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::ResourceType, id))
    }

    async fn list_deployment_managers(&self) -> AdapterResult<Vec<DeploymentManager>> {
        Ok(self.deployment_managers.list())
    }

    async fn get_deployment_manager(&self, id: &str) -> AdapterResult<DeploymentManager> {
        self.deployment_managers
            .get(id)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::DeploymentManager, id))
    }

    async fn create_subscription(&self, subscription: Subscription) -> AdapterResult<Subscription> {
        let id = subscription.subscription_id.clone();
        self.subscriptions
            .insert_new(&id, subscription)
            .map_err(|e| table_error(ObjectKind::Subscription, &id, e))
    }

    async fn get_subscription(&self, id: &str) -> AdapterResult<Subscription> {
        self.subscriptions
            .get(id)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::Subscription, id))
    }

    async fn update_subscription(&self, subscription: Subscription) -> AdapterResult<Subscription> {
        let id = subscription.subscription_id.clone();
        self.subscriptions
            .replace(&id, subscription)
            .map_err(|e| table_error(ObjectKind::Subscription, &id, e))
    }

    async fn delete_subscription(&self, id: &str) -> AdapterResult<()> {
        self.subscriptions
            .remove(id)
            .map(drop)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::Subscription, id))
    }
}
