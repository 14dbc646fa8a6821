//! Tenant resolution for the tenant-scoped inventory surface.
//!
//! Header beats query parameter, which beats the default tenant. A request
//! carrying the configured platform-admin token becomes a platform admin.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::HeaderName;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ocloud_core::{TenantContext, Validator, DEFAULT_TENANT};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::service::{ApiError, TenancyConfig};

/// Derives the request's [`TenantContext`].
///
/// # Errors
///
/// `Validation` when the supplied tenant id is not a valid identifier.
pub fn resolve_tenant(config: &TenancyConfig, req: &Request) -> Result<TenantContext, ApiError> {
    let from_header = req
        .headers()
        .get(config.tenant_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let tenant_id = from_header
        .or_else(|| query_param(req.uri().query(), &config.tenant_query_param))
        .unwrap_or_else(|| DEFAULT_TENANT.to_string());

    let mut v = Validator::new();
    v.identifier("tenantId", &tenant_id);
    ApiError::check(v.finish())?;

    let is_admin = match (config.admin_token.as_deref(), req.headers().get(config.admin_header.as_str())) {
        (Some(expected), Some(supplied)) => {
            bool::from(expected.as_bytes().ct_eq(supplied.as_bytes()))
        }
        _ => false,
    };

    Ok(if is_admin {
        TenantContext::platform_admin(tenant_id)
    } else {
        TenantContext::new(tenant_id)
    })
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Places the tenant into request extensions and echoes it in the response.
pub async fn tenant_middleware(
    State(config): State<Arc<TenancyConfig>>,
    mut req: Request,
    next: Next,
) -> Response {
    let tenant = match resolve_tenant(&config, &req) {
        Ok(tenant) => tenant,
        Err(err) => return err.into_response(),
    };
    debug!(tenant = %tenant.tenant_id, admin = tenant.is_platform_admin, "resolved tenant");

    let echoed = HeaderValue::from_str(&tenant.tenant_id).ok();
    req.extensions_mut().insert(tenant);
    let mut response = next.run(req).await;
    if let (Some(value), Ok(name)) = (echoed, HeaderName::try_from(config.tenant_header.as_str())) {
        response.headers_mut().insert(name, value);
    }
    response
}
