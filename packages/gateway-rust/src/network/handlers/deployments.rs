//! Deployment lifecycle endpoints. `?backend=<name>` picks a deployment
//! backend; without it the registry default serves the request.

use axum::extract::{OriginalUri, Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use ocloud_core::{Deployment, DeploymentRequest};
use serde::Deserialize;

use super::{created, ApiJson, ApiQuery, AppState};
use crate::registry::EntrySummary;
use crate::service::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct BackendQuery {
    pub backend: Option<String>,
}

pub async fn list_deployments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BackendQuery>,
) -> Result<Json<Vec<Deployment>>, ApiError> {
    Ok(Json(
        state
            .services
            .deployments
            .list(query.backend.as_deref())
            .await?,
    ))
}

pub async fn get_deployment(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BackendQuery>,
    Path(id): Path<String>,
) -> Result<Json<Deployment>, ApiError> {
    Ok(Json(
        state
            .services
            .deployments
            .get(query.backend.as_deref(), &id)
            .await?,
    ))
}

pub async fn create_deployment(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BackendQuery>,
    OriginalUri(uri): OriginalUri,
    ApiJson(request): ApiJson<DeploymentRequest>,
) -> Result<Response, ApiError> {
    let deployment = state
        .services
        .deployments
        .create(query.backend.as_deref(), request)
        .await?;
    let id = deployment.deployment_id.clone();
    Ok(created(uri.path(), &id, deployment))
}

pub async fn delete_deployment(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BackendQuery>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .deployments
        .delete(query.backend.as_deref(), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_backends(State(state): State<AppState>) -> Json<Vec<EntrySummary>> {
    Json(state.services.deployments.list_backends())
}

#[cfg(test)]
mod tests {
    use axum::http::header::LOCATION;
    use serde_json::json;

    use super::*;
    use crate::network::handlers::tests::{router, send, test_state};

    #[tokio::test]
    async fn deployment_lifecycle() {
        let state = test_state();
        let app = router(&state);

        let (status, headers, body) = send(
            &app,
            "POST",
            "/o2dms/v1/deployments",
            &[],
            Some(json!({"name": "du-7", "packageRef": "oci://charts/du:1.0", "namespace": "ran"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["deploymentId"].as_str().unwrap().to_string();
        assert_eq!(headers[LOCATION], format!("/o2dms/v1/deployments/{id}"));

        let (status, _, body) = send(&app, "GET", &format!("/o2dms/deployments/{id}"), &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "du-7");

        let (status, _, _) =
            send(&app, "DELETE", &format!("/o2dms/v1/deployments/{id}"), &[], None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unknown_backend_is_404() {
        let state = test_state();
        let app = router(&state);
        let (status, _, _) =
            send(&app, "GET", "/o2dms/v1/deployments?backend=argo", &[], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = send(&app, "GET", "/o2dms/v1/backends", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "memory");
    }
}
