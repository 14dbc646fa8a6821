//! Subscription endpoints.

use axum::extract::{OriginalUri, Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use ocloud_core::{Subscription, SubscriptionInput, SubscriptionUpdate, TenantContext};

use super::{created, ApiJson, AppState};
use crate::service::ApiError;

pub async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    Ok(Json(state.services.inventory.list_subscriptions(&tenant).await?))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<Json<Subscription>, ApiError> {
    Ok(Json(
        state.services.inventory.get_subscription(&tenant, &id).await?,
    ))
}

pub async fn create_subscription(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    OriginalUri(uri): OriginalUri,
    ApiJson(input): ApiJson<SubscriptionInput>,
) -> Result<Response, ApiError> {
    let subscription = state
        .services
        .inventory
        .create_subscription(&tenant, input)
        .await?;
    let id = subscription.subscription_id.clone();
    Ok(created(uri.path(), &id, subscription))
}

pub async fn update_subscription(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<SubscriptionUpdate>,
) -> Result<Json<Subscription>, ApiError> {
    Ok(Json(
        state
            .services
            .inventory
            .update_subscription(&tenant, &id, update)
            .await?,
    ))
}

pub async fn delete_subscription(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .inventory
        .delete_subscription(&tenant, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::header::LOCATION;
    use serde_json::json;

    use super::*;
    use crate::network::handlers::tests::{router, send, test_state, IMS};

    fn collection() -> String {
        format!("{IMS}/v1/subscriptions")
    }

    #[tokio::test]
    async fn create_and_fetch() {
        let state = test_state();
        let app = router(&state);
        let (status, headers, body) = send(
            &app,
            "POST",
            &collection(),
            &[("X-Tenant-ID", "acme")],
            Some(json!({
                "callback": "https://hooks.example.com/notify",
                "filter": {"resourcePoolIds": ["pool-edge"]}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["subscriptionId"].as_str().unwrap().to_string();
        assert_eq!(headers[LOCATION], format!("{}/{id}", collection()));

        let (status, _, body) = send(
            &app,
            "GET",
            &format!("{}/{id}", collection()),
            &[("X-Tenant-ID", "acme")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["callback"], "https://hooks.example.com/notify");
    }

    #[tokio::test]
    async fn cross_tenant_read_looks_like_missing() {
        let state = test_state();
        let app = router(&state);
        let (_, _, body) = send(
            &app,
            "POST",
            &collection(),
            &[("X-Tenant-ID", "acme")],
            Some(json!({"callback": "https://hooks.example.com/notify"})),
        )
        .await;
        let id = body["subscriptionId"].as_str().unwrap().to_string();

        let (foreign_status, _, foreign) = send(
            &app,
            "GET",
            &format!("{}/{id}", collection()),
            &[("X-Tenant-ID", "globex")],
            None,
        )
        .await;
        let (missing_status, _, missing) = send(
            &app,
            "GET",
            &format!("{}/does-not-exist", collection()),
            &[("X-Tenant-ID", "globex")],
            None,
        )
        .await;

        assert_eq!(foreign_status, StatusCode::NOT_FOUND);
        assert_eq!(missing_status, StatusCode::NOT_FOUND);
        let keys = |v: &serde_json::Value| {
            v.as_object().unwrap().keys().cloned().collect::<Vec<_>>()
        };
        assert_eq!(keys(&foreign), keys(&missing));

        let (status, _, _) = send(
            &app,
            "DELETE",
            &format!("{}/{id}", collection()),
            &[("X-Tenant-ID", "globex")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn private_callback_is_rejected() {
        let state = test_state();
        let app = router(&state);
        let (status, _, body) = send(
            &app,
            "POST",
            &collection(),
            &[],
            Some(json!({"callback": "http://10.1.2.3/hook"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn null_filter_clears_and_omitted_filter_keeps() {
        let state = test_state();
        let app = router(&state);
        let (_, _, body) = send(
            &app,
            "POST",
            &collection(),
            &[],
            Some(json!({
                "callback": "https://hooks.example.com/notify",
                "filter": {"resourceTypeIds": ["compute-node"]}
            })),
        )
        .await;
        let item = format!("{}/{}", collection(), body["subscriptionId"].as_str().unwrap());

        let (status, _, body) = send(
            &app,
            "PUT",
            &item,
            &[],
            Some(json!({"consumerSubscriptionId": "smo-42"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filter"]["resourceTypeIds"][0], "compute-node");

        let (status, _, body) = send(&app, "PUT", &item, &[], Some(json!({"filter": null}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("filter").is_none_or(serde_json::Value::is_null));

        let (status, _, _) = send(&app, "DELETE", &item, &[], None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
