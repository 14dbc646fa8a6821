//! Resource and resource-pool domain engine.
//!
//! Validates payloads, generates ids, enforces immutability and tenant
//! visibility, then delegates to the default inventory adapter. The engine
//! holds no mutable state and takes no locks: duplicate detection relies on
//! the adapter's atomic create.

use std::sync::Arc;

use ocloud_core::validation::{
    sanitize_id_component, MAX_DESCRIPTION_CHARS, MAX_ID_CHARS, MAX_NAME_CHARS,
};
use ocloud_core::{
    Adapter, AdapterError, Capability, DeploymentManager, ObjectKind, Resource, ResourceInput,
    ResourcePool, ResourcePoolInput, ResourceType, SubscriptionStore, TenantContext, Validator,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::registry::Registry;
use crate::service::callback::CallbackValidator;
use crate::service::error::ApiError;

/// Longest sanitized seed kept in a generated id.
const MAX_ID_SEED_CHARS: usize = 64;

/// Server-side filters for resource listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    pub resource_pool_id: Option<String>,
    pub resource_type_id: Option<String>,
}

impl ResourceQuery {
    fn matches(&self, resource: &Resource) -> bool {
        self.resource_pool_id
            .as_deref()
            .is_none_or(|p| p == resource.resource_pool_id)
            && self
                .resource_type_id
                .as_deref()
                .is_none_or(|t| t == resource.resource_type_id)
    }
}

/// Inventory and subscription operations against the default adapter.
pub struct InventoryService {
    pub(super) adapters: Arc<Registry<dyn Adapter>>,
    pub(super) store: Arc<dyn SubscriptionStore>,
    pub(super) callbacks: Arc<CallbackValidator>,
}

impl InventoryService {
    #[must_use]
    pub fn new(
        adapters: Arc<Registry<dyn Adapter>>,
        store: Arc<dyn SubscriptionStore>,
        callbacks: Arc<CallbackValidator>,
    ) -> Self {
        Self {
            adapters,
            store,
            callbacks,
        }
    }

    #[must_use]
    pub fn adapters(&self) -> &Arc<Registry<dyn Adapter>> {
        &self.adapters
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    /// The default adapter, provided it declares `capability`.
    pub(super) fn adapter(&self, capability: Capability) -> Result<Arc<dyn Adapter>, ApiError> {
        Ok(self.adapters.select(None, capability)?.backend)
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    /// Lists resources visible to `tenant`, narrowed by `query`.
    ///
    /// # Errors
    ///
    /// `ServiceUnavailable` without a capable default adapter; adapter errors.
    pub async fn list_resources(
        &self,
        tenant: &TenantContext,
        query: &ResourceQuery,
    ) -> Result<Vec<Resource>, ApiError> {
        let adapter = self.adapter(Capability::Resources)?;
        let mut resources = adapter.list_resources().await?;
        resources.retain(|r| tenant.can_access(r.tenant_id.as_deref()) && query.matches(r));
        Ok(resources)
    }

    /// # Errors
    ///
    /// `NotFound` when absent or owned by another tenant.
    pub async fn get_resource(
        &self,
        tenant: &TenantContext,
        id: &str,
    ) -> Result<Resource, ApiError> {
        let adapter = self.adapter(Capability::Resources)?;
        visible_resource(adapter.as_ref(), tenant, id).await
    }

    /// Validates and creates a resource owned by `tenant`.
    ///
    /// # Errors
    ///
    /// `Validation` listing every violated rule, `Conflict` for a duplicate
    /// id, `Internal` for other adapter failures.
    pub async fn create_resource(
        &self,
        tenant: &TenantContext,
        input: ResourceInput,
    ) -> Result<Resource, ApiError> {
        let mut v = Validator::new();
        v.require("resourceTypeId", input.resource_type_id.as_deref());
        v.require("resourcePoolId", input.resource_pool_id.as_deref());
        if let Some(id) = input.resource_id.as_deref() {
            v.identifier("resourceId", id);
        }
        check_resource_fields(&mut v, &input);
        ApiError::check(v.finish())?;

        let adapter = self.adapter(Capability::Resources)?;
        let resource_type_id = input.resource_type_id.unwrap_or_default();
        let resource_id = input
            .resource_id
            .unwrap_or_else(|| format!("{}-{}", id_seed(&resource_type_id, "resource"), Uuid::new_v4().simple()));

        let resource = Resource {
            resource_id,
            resource_type_id,
            resource_pool_id: input.resource_pool_id.unwrap_or_default(),
            description: input.description.unwrap_or_default(),
            global_asset_id: input.global_asset_id,
            extensions: input.extensions.unwrap_or_default(),
            tenant_id: Some(tenant.tenant_id.clone()),
        };
        let created = adapter.create_resource(resource).await?;
        info!(resource_id = %created.resource_id, tenant = %tenant.tenant_id, "created resource");
        Ok(created)
    }

    /// Applies a partial update. Omitted fields keep their stored values;
    /// type and pool cannot change once set.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation` (including immutability), adapter errors.
    pub async fn update_resource(
        &self,
        tenant: &TenantContext,
        id: &str,
        input: ResourceInput,
    ) -> Result<Resource, ApiError> {
        let adapter = self.adapter(Capability::Resources)?;
        let existing = visible_resource(adapter.as_ref(), tenant, id).await?;

        let mut v = Validator::new();
        if input.resource_id.as_deref().is_some_and(|body_id| body_id != id) {
            v.reject("resourceId in the body does not match the request path");
        }
        immutable(&mut v, "resourceTypeId", &existing.resource_type_id, input.resource_type_id.as_deref());
        immutable(&mut v, "resourcePoolId", &existing.resource_pool_id, input.resource_pool_id.as_deref());
        check_resource_fields(&mut v, &input);
        ApiError::check(v.finish())?;

        let merged = Resource {
            resource_id: existing.resource_id,
            resource_type_id: input.resource_type_id.unwrap_or(existing.resource_type_id),
            resource_pool_id: input.resource_pool_id.unwrap_or(existing.resource_pool_id),
            description: input.description.unwrap_or(existing.description),
            global_asset_id: input.global_asset_id.or(existing.global_asset_id),
            extensions: input.extensions.unwrap_or(existing.extensions),
            tenant_id: existing.tenant_id,
        };
        Ok(adapter.update_resource(merged).await?)
    }

    /// # Errors
    ///
    /// `NotFound` when absent or owned by another tenant.
    pub async fn delete_resource(&self, tenant: &TenantContext, id: &str) -> Result<(), ApiError> {
        let adapter = self.adapter(Capability::Resources)?;
        visible_resource(adapter.as_ref(), tenant, id).await?;
        adapter.delete_resource(id).await?;
        info!(resource_id = id, tenant = %tenant.tenant_id, "deleted resource");
        Ok(())
    }

    /// Re-creates a resource exactly as snapshotted, bypassing validation.
    pub(crate) async fn restore_resource(&self, snapshot: Resource) -> Result<(), ApiError> {
        let adapter = self.adapter(Capability::Resources)?;
        adapter.create_resource(snapshot).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resource pools
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// `ServiceUnavailable` without a capable default adapter; adapter errors.
    pub async fn list_resource_pools(&self) -> Result<Vec<ResourcePool>, ApiError> {
        let adapter = self.adapter(Capability::ResourcePools)?;
        Ok(adapter.list_resource_pools().await?)
    }

    /// # Errors
    ///
    /// `NotFound` when absent.
    pub async fn get_resource_pool(&self, id: &str) -> Result<ResourcePool, ApiError> {
        let adapter = self.adapter(Capability::ResourcePools)?;
        Ok(adapter.get_resource_pool(id).await?)
    }

    /// Creates a pool; the id defaults to `pool-<sanitized-name>-<random>`.
    ///
    /// # Errors
    ///
    /// `Validation`, `Conflict` for a duplicate id, adapter errors.
    pub async fn create_resource_pool(
        &self,
        input: ResourcePoolInput,
    ) -> Result<ResourcePool, ApiError> {
        let mut v = Validator::new();
        v.require("name", input.name.as_deref());
        if let Some(id) = input.resource_pool_id.as_deref() {
            v.identifier("resourcePoolId", id);
        }
        check_pool_fields(&mut v, &input);
        ApiError::check(v.finish())?;

        let adapter = self.adapter(Capability::ResourcePools)?;
        let name = input.name.unwrap_or_default();
        let resource_pool_id = input
            .resource_pool_id
            .unwrap_or_else(|| format!("pool-{}-{}", id_seed(&name, "pool"), Uuid::new_v4().simple()));

        let pool = ResourcePool {
            resource_pool_id,
            name,
            description: input.description.unwrap_or_default(),
            location: input.location,
            extensions: input.extensions.unwrap_or_default(),
        };
        let created = adapter.create_resource_pool(pool).await?;
        info!(resource_pool_id = %created.resource_pool_id, "created resource pool");
        Ok(created)
    }

    /// Updates name, description, location, or extensions. The id is fixed.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, adapter errors.
    pub async fn update_resource_pool(
        &self,
        id: &str,
        input: ResourcePoolInput,
    ) -> Result<ResourcePool, ApiError> {
        let adapter = self.adapter(Capability::ResourcePools)?;
        let existing = adapter.get_resource_pool(id).await?;

        let mut v = Validator::new();
        if input.resource_pool_id.as_deref().is_some_and(|body_id| body_id != id) {
            v.reject("resourcePoolId in the body does not match the request path");
        }
        if input.name.is_some() {
            v.require("name", input.name.as_deref());
        }
        check_pool_fields(&mut v, &input);
        ApiError::check(v.finish())?;

        let merged = ResourcePool {
            resource_pool_id: existing.resource_pool_id,
            name: input.name.unwrap_or(existing.name),
            description: input.description.unwrap_or(existing.description),
            location: input.location.or(existing.location),
            extensions: input.extensions.unwrap_or(existing.extensions),
        };
        Ok(adapter.update_resource_pool(merged).await?)
    }

    /// Deletes a pool that no longer contains resources.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Conflict` while resources still reference the pool.
    pub async fn delete_resource_pool(&self, id: &str) -> Result<(), ApiError> {
        let adapter = self.adapter(Capability::ResourcePools)?;
        adapter.get_resource_pool(id).await?;

        match adapter.list_resources().await {
            Ok(resources) => {
                let members = resources.iter().filter(|r| r.resource_pool_id == id).count();
                if members > 0 {
                    return Err(ApiError::Conflict(format!(
                        "resource pool '{id}' still contains {members} resource(s)"
                    )));
                }
            }
            Err(AdapterError::Unsupported(_)) => {}
            Err(e) => return Err(e.into()),
        }

        adapter.delete_resource_pool(id).await?;
        info!(resource_pool_id = id, "deleted resource pool");
        Ok(())
    }

    pub(crate) async fn restore_resource_pool(&self, snapshot: ResourcePool) -> Result<(), ApiError> {
        let adapter = self.adapter(Capability::ResourcePools)?;
        adapter.create_resource_pool(snapshot).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read-only catalogues
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// `ServiceUnavailable` without a capable default adapter; adapter errors.
    pub async fn list_resource_types(&self) -> Result<Vec<ResourceType>, ApiError> {
        let adapter = self.adapter(Capability::ResourceTypes)?;
        Ok(adapter.list_resource_types().await?)
    }

    /// # Errors
    ///
    /// `NotFound` when absent.
    pub async fn get_resource_type(&self, id: &str) -> Result<ResourceType, ApiError> {
        let adapter = self.adapter(Capability::ResourceTypes)?;
        Ok(adapter.get_resource_type(id).await?)
    }

    /// # Errors
    ///
    /// `ServiceUnavailable` without a capable default adapter; adapter errors.
    pub async fn list_deployment_managers(&self) -> Result<Vec<DeploymentManager>, ApiError> {
        let adapter = self.adapter(Capability::DeploymentManagers)?;
        Ok(adapter.list_deployment_managers().await?)
    }

    /// # Errors
    ///
    /// `NotFound` when absent.
    pub async fn get_deployment_manager(&self, id: &str) -> Result<DeploymentManager, ApiError> {
        let adapter = self.adapter(Capability::DeploymentManagers)?;
        Ok(adapter.get_deployment_manager(id).await?)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetches a resource, hiding ones the tenant may not see behind `NotFound`.
async fn visible_resource(
    adapter: &dyn Adapter,
    tenant: &TenantContext,
    id: &str,
) -> Result<Resource, ApiError> {
    let resource = adapter.get_resource(id).await?;
    if tenant.can_access(resource.tenant_id.as_deref()) {
        Ok(resource)
    } else {
        Err(AdapterError::not_found(ObjectKind::Resource, id).into())
    }
}

/// Sanitized, length-capped id seed; `fallback` when nothing survives.
fn id_seed(raw: &str, fallback: &str) -> String {
    let seed: String = sanitize_id_component(raw)
        .chars()
        .take(MAX_ID_SEED_CHARS)
        .collect();
    if seed.is_empty() {
        fallback.to_string()
    } else {
        seed
    }
}

fn immutable(v: &mut Validator, field: &str, existing: &str, supplied: Option<&str>) {
    if let Some(supplied) = supplied {
        if !existing.is_empty() && supplied != existing {
            v.reject(format!(
                "{field} is immutable (existing '{existing}', supplied '{supplied}')"
            ));
        }
    }
}

fn check_resource_fields(v: &mut Validator, input: &ResourceInput) {
    if let Some(type_id) = input.resource_type_id.as_deref() {
        v.max_chars("resourceTypeId", type_id, MAX_ID_CHARS);
    }
    if let Some(pool_id) = input.resource_pool_id.as_deref() {
        v.max_chars("resourcePoolId", pool_id, MAX_ID_CHARS);
    }
    if let Some(description) = input.description.as_deref() {
        v.max_chars("description", description, MAX_DESCRIPTION_CHARS);
    }
    if let Some(asset_id) = input.global_asset_id.as_deref() {
        v.global_asset_id(asset_id);
    }
    if let Some(extensions) = &input.extensions {
        v.extensions(extensions);
    }
}

fn check_pool_fields(v: &mut Validator, input: &ResourcePoolInput) {
    if let Some(name) = input.name.as_deref() {
        v.max_chars("name", name, MAX_NAME_CHARS);
    }
    if let Some(description) = input.description.as_deref() {
        v.max_chars("description", description, MAX_DESCRIPTION_CHARS);
    }
    if let Some(extensions) = &input.extensions {
        v.extensions(extensions);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
