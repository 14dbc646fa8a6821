//! HTTP handlers and the shared state they extract.
//!
//! Handlers are thin: they pull the tenant and the body out of the request,
//! call one domain service, and shape the status code. Every failure is an
//! [`ApiError`] rendered as problem-details JSON.

pub mod batch;
pub mod deployments;
pub mod health;
pub mod inventory;
pub mod plugins;
pub mod subscriptions;
pub mod versions;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::header::LOCATION;
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::shutdown::ShutdownController;
use super::version::VersionTable;
use crate::service::{ApiConfig, ApiError, Services, TenancyConfig};

/// Shared application state passed to all handlers via `State`.
///
/// Every field is behind an `Arc`, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub versions: Arc<VersionTable>,
    pub api: Arc<ApiConfig>,
    pub tenancy: Arc<TenancyConfig>,
    pub shutdown: Arc<ShutdownController>,
    /// Process start, for the uptime reported by `/health`.
    pub start_time: Instant,
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// JSON body whose rejections render as `Validation` problems.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string whose rejections render as `Validation` problems.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// 201 with a `Location` header pointing at `{collection_path}/{id}`.
pub(crate) fn created<T: Serialize>(collection_path: &str, id: &str, body: T) -> Response {
    let location = format!("{}/{id}", collection_path.trim_end_matches('/'));
    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::Router;
    use ocloud_core::{ApiVersion, OrchestrationPlugin};
    use tower::ServiceExt;

    use super::*;
    use crate::network::module::build_router;
    use crate::network::NetworkConfig;
    use crate::service::callback::tests::StaticResolver;
    use crate::service::plugins::tests::EchoPlugin;
    use crate::service::{GatewayConfig, Registries};
    use crate::storage::{MemoryAdapter, MemoryDeploymentBackend, MemorySubscriptionStore};

    pub(crate) const IMS: &str = "/o2ims-infrastructureInventory";

    /// State over fresh in-memory backends, with v1 stable, v2 deprecated
    /// and v0 sunset.
    pub(crate) fn test_state() -> AppState {
        let mut config = GatewayConfig::default();
        config.api.versions = vec![
            ApiVersion::stable("v1"),
            "v2:deprecated:2027-01-31:migrate to v1".parse().unwrap(),
            "v0:sunset".parse().unwrap(),
        ];
        config.tenancy.admin_token = Some("ops-token".into());

        let registries = Registries::new();
        registries
            .adapters
            .register_backend("memory", Arc::new(MemoryAdapter::new()), true)
            .unwrap();
        registries
            .deployments
            .register_backend("memory", Arc::new(MemoryDeploymentBackend::new()), true)
            .unwrap();
        let plugin: Arc<dyn OrchestrationPlugin> = Arc::new(EchoPlugin::default());
        registries.plugins.register_backend("echo", plugin, true).unwrap();

        let resolver = StaticResolver::default().with("hooks.example.com", &["93.184.216.34"]);
        let services = Services::new(
            &config,
            registries,
            Arc::new(MemorySubscriptionStore::new()),
            Arc::new(resolver),
        );

        AppState {
            services,
            versions: Arc::new(
                VersionTable::new(config.api.versions.clone(), &config.api.default_version)
                    .unwrap(),
            ),
            api: Arc::new(config.api),
            tenancy: Arc::new(config.tenancy),
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn router(state: &AppState) -> Router {
        build_router(state.clone(), &NetworkConfig::default())
    }

    /// Sends one request; returns status, headers and the parsed JSON body
    /// (`Null` for an empty body).
    pub(crate) async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }

    #[test]
    fn created_sets_location() {
        let response = created("/ims/v1/resources/", "r-1", serde_json::json!({"ok": true}));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[LOCATION], "/ims/v1/resources/r-1");
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_problem() {
        let state = test_state();
        let app = router(&state);
        let request = Request::builder()
            .method("POST")
            .uri(format!("{IMS}/v1/resources"))
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 16).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 400);
    }
}
