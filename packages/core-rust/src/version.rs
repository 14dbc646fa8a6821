//! API version lifecycle metadata.
//!
//! Lifecycle: `stable -> deprecated -> sunset`. A sunset version is terminal;
//! the gateway rejects every request addressed to it.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Stable,
    Deprecated,
    Sunset,
}

impl VersionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Deprecated => "deprecated",
            Self::Sunset => "sunset",
        }
    }
}

/// A configured API version and its lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersion {
    /// Version token as it appears in the path, e.g. `v1`.
    pub version: String,
    pub status: VersionStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sunset_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deprecation_message: Option<String>,
}

impl ApiVersion {
    /// A `stable` version with no lifecycle metadata.
    #[must_use]
    pub fn stable(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            status: VersionStatus::Stable,
            sunset_date: None,
            deprecation_message: None,
        }
    }
}

/// Returns `true` for path segments of the form `v<digits>`.
#[must_use]
pub fn is_version_token(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Errors from parsing a version spec string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionSpecError {
    #[error("version token '{0}' must look like v<digits>")]
    BadToken(String),
    #[error("unknown version status '{0}' (expected stable, deprecated or sunset)")]
    BadStatus(String),
    #[error("invalid sunset date '{0}' (expected YYYY-MM-DD)")]
    BadDate(String),
}

/// Parses `v1:stable`, `v2:deprecated[:YYYY-MM-DD[:notice]]` or `v0:sunset`.
impl FromStr for ApiVersion {
    type Err = VersionSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parts = spec.splitn(4, ':');
        let token = parts.next().unwrap_or_default().trim();
        if !is_version_token(token) {
            return Err(VersionSpecError::BadToken(token.to_string()));
        }

        let status = match parts.next().map(str::trim).unwrap_or("stable") {
            "stable" => VersionStatus::Stable,
            "deprecated" => VersionStatus::Deprecated,
            "sunset" => VersionStatus::Sunset,
            other => return Err(VersionSpecError::BadStatus(other.to_string())),
        };

        let sunset_date = match parts.next().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| VersionSpecError::BadDate(raw.to_string()))?,
            ),
        };

        let deprecation_message = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            version: token.to_string(),
            status,
            sunset_date,
            deprecation_message,
        })
    }
}
