//! Infrastructure inventory endpoints: resources, resource pools, resource
//! types, deployment managers, and the adapter listing.

use axum::extract::{OriginalUri, Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use ocloud_core::{
    DeploymentManager, Resource, ResourceInput, ResourcePool, ResourcePoolInput, ResourceType,
    TenantContext,
};

use super::{created, ApiJson, ApiQuery, AppState};
use crate::registry::EntrySummary;
use crate::service::{ApiError, ResourceQuery};

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

pub async fn list_resources(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(query): ApiQuery<ResourceQuery>,
) -> Result<Json<Vec<Resource>>, ApiError> {
    Ok(Json(state.services.inventory.list_resources(&tenant, &query).await?))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<Json<Resource>, ApiError> {
    Ok(Json(state.services.inventory.get_resource(&tenant, &id).await?))
}

pub async fn create_resource(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    OriginalUri(uri): OriginalUri,
    ApiJson(input): ApiJson<ResourceInput>,
) -> Result<Response, ApiError> {
    let resource = state.services.inventory.create_resource(&tenant, input).await?;
    let id = resource.resource_id.clone();
    Ok(created(uri.path(), &id, resource))
}

pub async fn update_resource(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ResourceInput>,
) -> Result<Json<Resource>, ApiError> {
    Ok(Json(
        state.services.inventory.update_resource(&tenant, &id, input).await?,
    ))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.services.inventory.delete_resource(&tenant, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Resource pools
// ---------------------------------------------------------------------------

pub async fn list_resource_pools(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResourcePool>>, ApiError> {
    Ok(Json(state.services.inventory.list_resource_pools().await?))
}

pub async fn get_resource_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResourcePool>, ApiError> {
    Ok(Json(state.services.inventory.get_resource_pool(&id).await?))
}

pub async fn create_resource_pool(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    ApiJson(input): ApiJson<ResourcePoolInput>,
) -> Result<Response, ApiError> {
    let pool = state.services.inventory.create_resource_pool(input).await?;
    let id = pool.resource_pool_id.clone();
    Ok(created(uri.path(), &id, pool))
}

pub async fn update_resource_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ResourcePoolInput>,
) -> Result<Json<ResourcePool>, ApiError> {
    Ok(Json(
        state.services.inventory.update_resource_pool(&id, input).await?,
    ))
}

pub async fn delete_resource_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.services.inventory.delete_resource_pool(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Read-only inventory
// ---------------------------------------------------------------------------

pub async fn list_resource_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResourceType>>, ApiError> {
    Ok(Json(state.services.inventory.list_resource_types().await?))
}

pub async fn get_resource_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResourceType>, ApiError> {
    Ok(Json(state.services.inventory.get_resource_type(&id).await?))
}

pub async fn list_deployment_managers(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeploymentManager>>, ApiError> {
    Ok(Json(
        state.services.inventory.list_deployment_managers().await?,
    ))
}

pub async fn get_deployment_manager(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeploymentManager>, ApiError> {
    Ok(Json(
        state.services.inventory.get_deployment_manager(&id).await?,
    ))
}

/// Registered adapters with capability and health summaries.
pub async fn list_adapters(State(state): State<AppState>) -> Json<Vec<EntrySummary>> {
    Json(
        state
            .services
            .registries
            .adapters
            .list()
            .iter()
            .map(|e| e.summary())
            .collect(),
    )
}
