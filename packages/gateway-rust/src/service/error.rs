//! HTTP-facing error taxonomy.
//!
//! Every failure leaving the domain engine is an [`ApiError`]. Collaborator
//! errors are mapped by kind, never by message text. `Internal` errors are
//! logged with a correlation id; callers only ever see the id.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ocloud_core::{AdapterError, StoreError, ValidationResult};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::registry::RegistryError;
use crate::service::callback::CallbackError;

const INTERNAL_DETAIL: &str = "internal server error";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Client-fixable; lists every violated rule.
    #[error("validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("API version '{0}' has been sunset")]
    Gone(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![message.into()],
        }
    }

    /// Converts a validation outcome into `Ok(())` or `Validation`.
    ///
    /// # Errors
    ///
    /// `Validation` carrying every collected violation.
    pub fn check(result: ValidationResult) -> Result<(), Self> {
        match result {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { errors } => Err(Self::Validation { errors }),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Gone(_) => StatusCode::GONE,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error for a client.
    ///
    /// `Internal` is logged here with a fresh correlation id, which is the
    /// only detail returned.
    #[must_use]
    pub fn into_problem(self) -> ProblemDetails {
        let status = self.status();
        let title = status.canonical_reason().unwrap_or("Error").to_string();
        match self {
            Self::Internal(source) => {
                let correlation_id = Uuid::new_v4().to_string();
                error!(correlation_id = %correlation_id, error = ?source, "internal error");
                ProblemDetails {
                    status: status.as_u16(),
                    title,
                    detail: INTERNAL_DETAIL.to_string(),
                    errors: Vec::new(),
                    correlation_id: Some(correlation_id),
                }
            }
            Self::Validation { errors } => ProblemDetails {
                status: status.as_u16(),
                title,
                detail: format!("validation failed: {}", errors.join("; ")),
                errors,
                correlation_id: None,
            },
            other => ProblemDetails {
                status: status.as_u16(),
                title,
                detail: other.to_string(),
                errors: Vec::new(),
                correlation_id: None,
            },
        }
    }
}

/// Problem-details JSON body returned for every error response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    pub status: u16,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.into_problem())).into_response()
    }
}

// ---------------------------------------------------------------------------
// Collaborator error mapping
// ---------------------------------------------------------------------------

impl From<AdapterError> for ApiError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotFound { .. } => Self::NotFound(err.to_string()),
            AdapterError::AlreadyExists { .. } => Self::Conflict(err.to_string()),
            AdapterError::Unsupported(_) => Self::ServiceUnavailable(err.to_string()),
            AdapterError::Backend(source) => Self::Internal(source),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(err.to_string()),
            StoreError::AlreadyExists(_) => Self::Conflict(err.to_string()),
            StoreError::Backend(source) => Self::Internal(source),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { .. } => Self::NotFound(err.to_string()),
            RegistryError::Conflict { .. } => Self::Conflict(err.to_string()),
            RegistryError::Empty { .. }
            | RegistryError::NoDefault { .. }
            | RegistryError::Unsupported { .. }
            | RegistryError::Closed { .. } => Self::ServiceUnavailable(err.to_string()),
        }
    }
}

impl From<CallbackError> for ApiError {
    fn from(err: CallbackError) -> Self {
        Self::validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use ocloud_core::ObjectKind;

    use super::*;

    #[test]
    fn adapter_errors_map_by_kind() {
        let cases = [
            (AdapterError::not_found(ObjectKind::Resource, "r"), StatusCode::NOT_FOUND),
            (AdapterError::already_exists(ObjectKind::Resource, "r"), StatusCode::CONFLICT),
            (AdapterError::Unsupported("watch"), StatusCode::SERVICE_UNAVAILABLE),
            (AdapterError::Backend(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn registry_errors_map_by_kind() {
        let kind = "adapter";
        assert_eq!(
            ApiError::from(RegistryError::NotFound { kind, name: "x".into() }).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(RegistryError::Conflict { kind, name: "x".into() }).status(),
            StatusCode::CONFLICT
        );
        for err in [
            RegistryError::Empty { kind },
            RegistryError::NoDefault { kind },
            RegistryError::Closed { kind },
        ] {
            assert_eq!(ApiError::from(err).status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[test]
    fn internal_problem_hides_source() {
        let problem = ApiError::Internal(anyhow::anyhow!("password=hunter2")).into_problem();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.detail, INTERNAL_DETAIL);
        assert!(problem.correlation_id.is_some());
        let body = serde_json::to_string(&problem).unwrap();
        assert!(!body.contains("hunter2"));
        assert!(body.contains("correlationId"));
    }

    #[test]
    fn validation_problem_lists_every_error() {
        let err = ApiError::check(ValidationResult::Invalid {
            errors: vec!["a is required".into(), "b is required".into()],
        })
        .unwrap_err();
        let problem = err.into_problem();
        assert_eq!(problem.status, 400);
        assert_eq!(problem.errors.len(), 2);
        assert!(problem.detail.contains("a is required; b is required"));
    }

    #[tokio::test]
    async fn response_carries_status_and_json() {
        let response = ApiError::Gone("v0".into()).into_response();
        assert_eq!(response.status(), StatusCode::GONE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 410);
        assert_eq!(json["title"], "Gone");
        assert_eq!(json["detail"], "API version 'v0' has been sunset");
    }
}
