//! HTTP middleware stack for the gateway.
//!
//! Transport layers wrap every route, health endpoints included. Ordering
//! is outer-to-inner: the first layer listed sees the request first and the
//! response last.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{HeaderName, LOCATION};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer, ExposeHeaders};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;
use super::shutdown::ShutdownController;
use super::version::{DEPRECATION, SUNSET, X_API_DEPRECATION_NOTICE, X_API_STATUS, X_API_VERSION};

type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        TimeoutLayer,
        tower::layer::util::Stack<
            CorsLayer,
            tower::layer::util::Stack<
                CompressionLayer,
                tower::layer::util::Stack<
                    TraceLayer<
                        tower_http::classify::SharedClassifier<
                            tower_http::classify::ServerErrorsAsFailures,
                        >,
                    >,
                    tower::layer::util::Stack<
                        SetRequestIdLayer<MakeRequestUuid>,
                        tower::layer::util::Identity,
                    >,
                >,
            >,
        >,
    >,
>;

/// Builds the transport middleware stack.
///
/// 1. `SetRequestId` assigns a UUID v4 `X-Request-Id`
/// 2. `Tracing` opens a span per request
/// 3. `Compression` gzips responses
/// 4. `CORS` from the configured origins, exposing the version headers,
///    `Location`, and `tenant_header`
/// 5. `Timeout` answers 408 past `request_timeout`
/// 6. `PropagateRequestId` echoes `X-Request-Id` on the response
#[must_use]
pub fn build_http_layers(config: &NetworkConfig, tenant_header: &str) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins, tenant_header))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

/// `"*"` allows any origin; otherwise only the parseable listed ones.
fn build_cors_layer(origins: &[String], tenant_header: &str) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    let mut exposed = vec![
        X_API_VERSION,
        X_API_STATUS,
        DEPRECATION,
        SUNSET,
        X_API_DEPRECATION_NOTICE,
        LOCATION,
    ];
    exposed.extend(HeaderName::try_from(tenant_header).ok());

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .expose_headers(ExposeHeaders::list(exposed))
}

/// Counts the request as in flight until its response is produced.
pub async fn track_in_flight(
    State(shutdown): State<Arc<ShutdownController>>,
    req: Request,
    next: Next,
) -> Response {
    let _guard = shutdown.in_flight_guard();
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn layers_build_with_defaults() {
        let _layers = build_http_layers(&NetworkConfig::default(), "X-Tenant-ID");
    }

    #[test]
    fn layers_build_with_custom_timeout_and_origins() {
        let config = NetworkConfig {
            request_timeout: Duration::from_secs(5),
            cors_origins: vec!["https://smo.example.com".into(), "not a header\n".into()],
            ..NetworkConfig::default()
        };
        let _layers = build_http_layers(&config, "X-Tenant-ID");
    }

    #[tokio::test]
    async fn request_id_is_propagated() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(build_http_layers(&NetworkConfig::default(), "X-Tenant-ID"));

        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn cors_exposes_configured_tenant_header() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(build_http_layers(&NetworkConfig::default(), "X-Org-Id"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header("origin", "https://smo.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let exposed = response.headers()["access-control-expose-headers"]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(exposed.contains("x-org-id"), "{exposed}");
        assert!(!exposed.contains("x-tenant-id"), "{exposed}");
        assert!(exposed.contains("x-api-version"), "{exposed}");
    }

    #[tokio::test]
    async fn in_flight_guard_is_held_during_handler() {
        let shutdown = Arc::new(ShutdownController::new());
        let observed = Arc::clone(&shutdown);
        let app = Router::new()
            .route(
                "/count",
                get(move || {
                    let observed = Arc::clone(&observed);
                    async move { observed.in_flight_count().to_string() }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&shutdown),
                track_in_flight,
            ));

        let response = app
            .oneshot(Request::builder().uri("/count").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&body[..], b"1");
        assert_eq!(shutdown.in_flight_count(), 0);
    }
}
