//! Batch endpoints. A failed atomic batch answers 409 with the per-item
//! outcome (including compensation results) as the body.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use ocloud_core::{BatchRequest, TenantContext};

use super::{ApiJson, AppState};
use crate::service::{ApiError, BatchCollection, BatchOutcome};

pub async fn batch_create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(collection): Path<String>,
    ApiJson(request): ApiJson<BatchRequest<serde_json::Value>>,
) -> Result<Response, ApiError> {
    let collection: BatchCollection = collection.parse()?;
    let outcome = state
        .services
        .batch
        .create(&tenant, collection, request.items, request.atomic)
        .await?;
    Ok(respond(outcome))
}

pub async fn batch_delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(collection): Path<String>,
    ApiJson(request): ApiJson<BatchRequest<String>>,
) -> Result<Response, ApiError> {
    let collection: BatchCollection = collection.parse()?;
    let outcome = state
        .services
        .batch
        .delete(&tenant, collection, request.items, request.atomic)
        .await?;
    Ok(respond(outcome))
}

fn respond(outcome: BatchOutcome) -> Response {
    let status = if outcome.is_atomic_failure() {
        StatusCode::CONFLICT
    } else {
        StatusCode::OK
    };
    (status, Json(outcome)).into_response()
}
