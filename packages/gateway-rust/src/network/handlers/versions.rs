//! API version discovery. Not version-gated, so sunset versions are
//! still listed.

use axum::extract::State;
use axum::Json;
use ocloud_core::ApiVersion;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionListing {
    pub default_version: String,
    pub versions: Vec<ApiVersion>,
}

pub async fn list_versions(State(state): State<AppState>) -> Json<VersionListing> {
    Json(VersionListing {
        default_version: state.versions.default_version().to_string(),
        versions: state.versions.versions().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::network::handlers::tests::{router, send, test_state, IMS};

    #[tokio::test]
    async fn lists_every_configured_version() {
        let state = test_state();
        let app = router(&state);
        let (status, headers, body) = send(&app, "GET", &format!("{IMS}/api_versions"), &[], None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(headers.get("x-api-version").is_none());
        assert_eq!(body["defaultVersion"], "v1");
        assert_eq!(body["versions"].as_array().unwrap().len(), 3);
        assert_eq!(body["versions"][1]["status"], "deprecated");
        assert_eq!(body["versions"][1]["sunsetDate"], "2027-01-31");
    }
}
