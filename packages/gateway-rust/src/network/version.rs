//! API version lifecycle middleware.
//!
//! The version of a request is the path segment right after the API base
//! when it is shaped like `v<digits>`, otherwise the configured default.
//! Stable and deprecated versions pass through with identifying headers;
//! sunset versions get 410 and unknown ones 404 before any handler runs.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::NaiveTime;
use ocloud_core::version::is_version_token;
use ocloud_core::{ApiVersion, VersionStatus};

use crate::service::ApiError;

pub const X_API_VERSION: HeaderName = HeaderName::from_static("x-api-version");
pub const X_API_STATUS: HeaderName = HeaderName::from_static("x-api-status");
pub const DEPRECATION: HeaderName = HeaderName::from_static("deprecation");
pub const SUNSET: HeaderName = HeaderName::from_static("sunset");
pub const X_API_DEPRECATION_NOTICE: HeaderName =
    HeaderName::from_static("x-api-deprecation-notice");

/// Configured versions plus the default, validated at startup.
#[derive(Debug, Clone)]
pub struct VersionTable {
    versions: Vec<ApiVersion>,
    default_version: String,
}

impl VersionTable {
    /// # Errors
    ///
    /// Fails when a version id is malformed or duplicated, or when the
    /// default is missing from the table or sunset.
    pub fn new(versions: Vec<ApiVersion>, default_version: &str) -> anyhow::Result<Self> {
        for (i, v) in versions.iter().enumerate() {
            anyhow::ensure!(
                is_version_token(&v.version),
                "API version '{}' must look like v<digits>",
                v.version
            );
            anyhow::ensure!(
                !versions[..i].iter().any(|prev| prev.version == v.version),
                "API version '{}' is configured twice",
                v.version
            );
        }
        let default = versions
            .iter()
            .find(|v| v.version == default_version)
            .ok_or_else(|| {
                anyhow::anyhow!("default API version '{default_version}' is not configured")
            })?;
        anyhow::ensure!(
            default.status != VersionStatus::Sunset,
            "default API version '{default_version}' is sunset"
        );
        Ok(Self {
            versions,
            default_version: default_version.to_string(),
        })
    }

    #[must_use]
    pub fn get(&self, version: &str) -> Option<&ApiVersion> {
        self.versions.iter().find(|v| v.version == version)
    }

    #[must_use]
    pub fn versions(&self) -> &[ApiVersion] {
        &self.versions
    }

    #[must_use]
    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    /// Resolves the version a path addresses.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unconfigured version, `Gone` for a sunset one.
    pub fn resolve(&self, path: &str) -> Result<&ApiVersion, ApiError> {
        // "/{base}/{segment}/...": only the segment after the base names a version.
        let token = path
            .split('/')
            .nth(2)
            .filter(|segment| is_version_token(segment))
            .unwrap_or(&self.default_version);
        let version = self
            .get(token)
            .ok_or_else(|| ApiError::NotFound(format!("API version '{token}' is not supported")))?;
        if version.status == VersionStatus::Sunset {
            return Err(ApiError::Gone(version.version.clone()));
        }
        Ok(version)
    }
}

/// Gates every API request on its version's lifecycle.
///
/// The resolved [`ApiVersion`] is stored in request extensions.
pub async fn version_middleware(
    State(table): State<Arc<VersionTable>>,
    mut req: Request,
    next: Next,
) -> Response {
    let version = match table.resolve(req.uri().path()) {
        Ok(version) => version.clone(),
        Err(err) => {
            let sunset = match &err {
                ApiError::Gone(name) => table.get(name).cloned(),
                _ => None,
            };
            let mut response = err.into_response();
            if let Some(version) = sunset {
                apply_version_headers(response.headers_mut(), &version);
            }
            return response;
        }
    };

    req.extensions_mut().insert(version.clone());
    let mut response = next.run(req).await;
    apply_version_headers(response.headers_mut(), &version);
    response
}

/// Sets version, status, and deprecation metadata headers.
pub fn apply_version_headers(headers: &mut HeaderMap, version: &ApiVersion) {
    if let Ok(value) = HeaderValue::from_str(&version.version) {
        headers.insert(X_API_VERSION, value);
    }
    headers.insert(X_API_STATUS, HeaderValue::from_static(version.status.as_str()));

    if version.status == VersionStatus::Stable {
        return;
    }
    headers.insert(DEPRECATION, HeaderValue::from_static("true"));
    if let Some(date) = version.sunset_date {
        // RFC 7231 IMF-fixdate, midnight UTC.
        let stamp = date
            .and_time(NaiveTime::MIN)
            .and_utc()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        if let Ok(value) = HeaderValue::from_str(&stamp) {
            headers.insert(SUNSET, value);
        }
    }
    if let Some(notice) = version.deprecation_message.as_deref() {
        // Notices that are not valid header text are dropped.
        if let Ok(value) = HeaderValue::from_str(notice) {
            headers.insert(X_API_DEPRECATION_NOTICE, value);
        }
    }
}
