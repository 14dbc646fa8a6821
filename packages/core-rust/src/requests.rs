//! Request bodies accepted by the gateway's HTTP surface.
//!
//! Every field a client may omit is an `Option` so the domain engine can
//! tell "not supplied" apart from "supplied empty".

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Extensions, SubscriptionFilter};

/// Create or update payload for a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceInput {
    /// Client-supplied id. Generated from the type id when absent.
    pub resource_id: Option<String>,
    pub resource_type_id: Option<String>,
    pub resource_pool_id: Option<String>,
    pub description: Option<String>,
    pub global_asset_id: Option<String>,
    pub extensions: Option<Extensions>,
}

/// Create or update payload for a resource pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourcePoolInput {
    pub resource_pool_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub extensions: Option<Extensions>,
}

/// Create payload for a subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionInput {
    pub callback: String,
    pub consumer_subscription_id: Option<String>,
    pub filter: Option<SubscriptionFilter>,
}

/// What an update does to a subscription's filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPatch {
    /// `filter` was omitted: existing predicates stay.
    Keep,
    /// `filter` was `null` or `{}`: all predicates are removed.
    Clear,
    /// `filter` carried at least one predicate.
    Replace(SubscriptionFilter),
}

/// Update payload for a subscription.
///
/// `filter` is tri-state: absent, explicitly `null`, or an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionUpdate {
    pub callback: Option<String>,
    pub consumer_subscription_id: Option<String>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Option<SubscriptionFilter>>,
}

impl SubscriptionUpdate {
    /// Classifies the `filter` field of this update.
    #[must_use]
    pub fn filter_patch(&self) -> FilterPatch {
        match &self.filter {
            None => FilterPatch::Keep,
            Some(None) => FilterPatch::Clear,
            Some(Some(f)) if f.is_empty() => FilterPatch::Clear,
            Some(Some(f)) => FilterPatch::Replace(f.clone()),
        }
    }
}

/// Maps a present field (including `null`) to `Some(..)`; absence is handled
/// by `#[serde(default)]`.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Request to deploy a package through a deployment backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentRequest {
    pub name: String,
    pub description: Option<String>,
    pub package_ref: String,
    pub namespace: Option<String>,
    pub values: serde_json::Value,
}

/// Request to start a workflow on an orchestration plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowRequest {
    pub parameters: serde_json::Value,
}

/// Envelope for batch endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest<T> {
    pub items: Vec<T>,
    /// All-or-nothing mode with compensating rollback.
    #[serde(default)]
    pub atomic: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_filter_keeps_existing() {
        let update: SubscriptionUpdate =
            serde_json::from_str(r#"{"callback":"https://smo.example.com/n"}"#).unwrap();
        assert_eq!(update.filter_patch(), FilterPatch::Keep);
    }

    #[test]
    fn null_filter_clears() {
        let update: SubscriptionUpdate = serde_json::from_str(r#"{"filter":null}"#).unwrap();
        assert_eq!(update.filter_patch(), FilterPatch::Clear);
    }

    #[test]
    fn empty_filter_object_clears() {
        let update: SubscriptionUpdate = serde_json::from_str(r#"{"filter":{}}"#).unwrap();
        assert_eq!(update.filter_patch(), FilterPatch::Clear);
    }

    #[test]
    fn populated_filter_replaces() {
        let update: SubscriptionUpdate =
            serde_json::from_str(r#"{"filter":{"resourcePoolIds":["pool-a"]}}"#).unwrap();
        match update.filter_patch() {
            FilterPatch::Replace(f) => assert_eq!(f.resource_pool_ids, vec!["pool-a"]),
            other => panic!("expected Replace, got {other:?}"),
        }
    }

    #[test]
    fn batch_atomic_defaults_to_false() {
        let batch: BatchRequest<String> = serde_json::from_str(r#"{"items":["a","b"]}"#).unwrap();
        assert_eq!(batch.items.len(), 2);
        assert!(!batch.atomic);
    }
}
