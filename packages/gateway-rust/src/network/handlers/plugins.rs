//! Orchestration plugin endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use ocloud_core::{WorkflowDescriptor, WorkflowExecution, WorkflowRequest};

use super::{created, ApiJson, AppState};
use crate::registry::EntrySummary;
use crate::service::ApiError;

pub async fn list_plugins(State(state): State<AppState>) -> Result<Json<Vec<EntrySummary>>, ApiError> {
    Ok(Json(state.services.plugins.list_plugins()?))
}

pub async fn list_workflows(
    State(state): State<AppState>,
    Path(plugin): Path<String>,
) -> Result<Json<Vec<WorkflowDescriptor>>, ApiError> {
    Ok(Json(state.services.plugins.list_workflows(&plugin).await?))
}

/// Starts a run; `Location` points at the plugin's execution resource.
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path((plugin, workflow)): Path<(String, String)>,
    ApiJson(request): ApiJson<WorkflowRequest>,
) -> Result<Response, ApiError> {
    let execution = state
        .services
        .plugins
        .execute(&plugin, &workflow, request)
        .await?;
    let executions = format!("/{}/plugins/{plugin}/executions", state.api.smo_base);
    let id = execution.execution_id.clone();
    Ok(created(&executions, &id, execution))
}

pub async fn get_execution(
    State(state): State<AppState>,
    Path((plugin, execution_id)): Path<(String, String)>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    Ok(Json(
        state
            .services
            .plugins
            .get_execution(&plugin, &execution_id)
            .await?,
    ))
}
