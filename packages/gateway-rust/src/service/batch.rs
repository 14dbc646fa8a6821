//! Batch executor.
//!
//! Items run strictly in input order, one at a time, so compensation order
//! is reproducible. In atomic mode any failure triggers compensation in
//! reverse order: created items are deleted, deleted items are re-created
//! from snapshots. Compensation is best effort (a saga, not a
//! transaction): its failures are logged and reported per item but never
//! turn into a top-level error.

use std::str::FromStr;
use std::sync::Arc;

use ocloud_core::{
    Resource, ResourceInput, ResourcePool, ResourcePoolInput, Subscription, SubscriptionInput,
    TenantContext,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::service::error::ApiError;
use crate::service::inventory::InventoryService;

/// Collections that accept batch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchCollection {
    Resources,
    ResourcePools,
    Subscriptions,
}

impl BatchCollection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resources => "resources",
            Self::ResourcePools => "resourcePools",
            Self::Subscriptions => "subscriptions",
        }
    }
}

impl FromStr for BatchCollection {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resources" => Ok(Self::Resources),
            "resourcePools" => Ok(Self::ResourcePools),
            "subscriptions" => Ok(Self::Subscriptions),
            other => Err(ApiError::NotFound(format!(
                "collection '{other}' does not support batch operations"
            ))),
        }
    }
}

/// Outcome of one batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when this item's effect was undone by compensation.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub rolled_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_error: Option<String>,
}

impl BatchItemResult {
    fn ok(index: usize, id: String) -> Self {
        Self {
            index,
            success: true,
            id: Some(id),
            error: None,
            rolled_back: false,
            rollback_error: None,
        }
    }

    fn failed(index: usize, id: Option<String>, err: ApiError) -> Self {
        Self {
            index,
            success: false,
            id,
            error: Some(err.into_problem().detail),
            rolled_back: false,
            rollback_error: None,
        }
    }
}

/// Whole-batch result, serialized as the response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub atomic: bool,
    pub success_count: usize,
    pub failure_count: usize,
    /// True when an atomic batch failed and compensation ran.
    pub rolled_back: bool,
    pub results: Vec<BatchItemResult>,
}

impl BatchOutcome {
    fn new(atomic: bool, results: Vec<BatchItemResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            atomic,
            success_count,
            failure_count: results.len() - success_count,
            rolled_back: false,
            results,
        }
    }

    /// An atomic batch with at least one failed item (reported as 409).
    #[must_use]
    pub fn is_atomic_failure(&self) -> bool {
        self.atomic && self.failure_count > 0
    }
}

/// What a successful item did, so compensation can undo it.
enum Applied {
    Created(String),
    Deleted(Snapshot),
}

enum Snapshot {
    Resource(Resource),
    Pool(ResourcePool),
    Subscription(Subscription),
}

impl Snapshot {
    fn id(&self) -> &str {
        match self {
            Self::Resource(r) => &r.resource_id,
            Self::Pool(p) => &p.resource_pool_id,
            Self::Subscription(s) => &s.subscription_id,
        }
    }
}

/// Runs create and delete batches against the inventory engine.
pub struct BatchExecutor {
    inventory: Arc<InventoryService>,
    max_items: usize,
}

impl BatchExecutor {
    #[must_use]
    pub fn new(inventory: Arc<InventoryService>, max_items: usize) -> Self {
        Self {
            inventory,
            max_items,
        }
    }

    /// Creates every item of `items` in `collection`.
    ///
    /// An item that does not parse as the collection's payload fails on its
    /// own; the rest of the batch still runs.
    ///
    /// # Errors
    ///
    /// `Validation` when the item count is zero or above the limit. Item
    /// failures are reported inside the outcome.
    pub async fn create(
        &self,
        tenant: &TenantContext,
        collection: BatchCollection,
        items: Vec<serde_json::Value>,
        atomic: bool,
    ) -> Result<BatchOutcome, ApiError> {
        self.check_size(items.len())?;

        let mut results = Vec::with_capacity(items.len());
        let mut applied: Vec<(usize, Applied)> = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            match self.create_one(tenant, collection, item).await {
                Ok(id) => {
                    results.push(BatchItemResult::ok(index, id.clone()));
                    applied.push((index, Applied::Created(id)));
                }
                Err(err) => results.push(BatchItemResult::failed(index, None, err)),
            }
        }

        Ok(self.finish(tenant, collection, atomic, results, applied).await)
    }

    /// Deletes every id in `ids` from `collection`.
    ///
    /// Atomic batches first fetch every target; if any is missing or not
    /// visible, nothing is deleted.
    ///
    /// # Errors
    ///
    /// `Validation` when the item count is zero or above the limit.
    pub async fn delete(
        &self,
        tenant: &TenantContext,
        collection: BatchCollection,
        ids: Vec<String>,
        atomic: bool,
    ) -> Result<BatchOutcome, ApiError> {
        self.check_size(ids.len())?;

        if atomic {
            let mut missing = Vec::new();
            for (index, id) in ids.iter().enumerate() {
                if let Err(err) = self.snapshot(tenant, collection, id).await {
                    missing.push((index, err));
                }
            }
            if !missing.is_empty() {
                return Ok(aborted(&ids, missing));
            }
        }

        let mut results = Vec::with_capacity(ids.len());
        let mut applied: Vec<(usize, Applied)> = Vec::new();
        for (index, id) in ids.into_iter().enumerate() {
            let outcome = match self.snapshot(tenant, collection, &id).await {
                Ok(snapshot) => self
                    .delete_one(tenant, collection, &id)
                    .await
                    .map(|()| snapshot),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(snapshot) => {
                    results.push(BatchItemResult::ok(index, id));
                    applied.push((index, Applied::Deleted(snapshot)));
                }
                Err(err) => results.push(BatchItemResult::failed(index, Some(id), err)),
            }
        }

        Ok(self.finish(tenant, collection, atomic, results, applied).await)
    }

    fn check_size(&self, len: usize) -> Result<(), ApiError> {
        if len == 0 {
            return Err(ApiError::validation("batch must contain at least one item"));
        }
        if len > self.max_items {
            return Err(ApiError::validation(format!(
                "batch must not exceed {} items (got {len})",
                self.max_items
            )));
        }
        Ok(())
    }

    async fn finish(
        &self,
        tenant: &TenantContext,
        collection: BatchCollection,
        atomic: bool,
        results: Vec<BatchItemResult>,
        applied: Vec<(usize, Applied)>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::new(atomic, results);
        if outcome.is_atomic_failure() && !applied.is_empty() {
            self.compensate(tenant, collection, &mut outcome, applied).await;
        }
        info!(
            collection = collection.as_str(),
            atomic,
            succeeded = outcome.success_count,
            failed = outcome.failure_count,
            rolled_back = outcome.rolled_back,
            "batch finished"
        );
        outcome
    }

    /// Undoes `applied` in reverse order, recording each result on its item.
    async fn compensate(
        &self,
        tenant: &TenantContext,
        collection: BatchCollection,
        outcome: &mut BatchOutcome,
        applied: Vec<(usize, Applied)>,
    ) {
        warn!(
            collection = collection.as_str(),
            items = applied.len(),
            "atomic batch failed; compensating"
        );
        outcome.rolled_back = true;

        for (index, step) in applied.into_iter().rev() {
            let (id, result) = match step {
                Applied::Created(id) => {
                    let result = self.delete_one(tenant, collection, &id).await;
                    (id, result)
                }
                Applied::Deleted(snapshot) => {
                    let id = snapshot.id().to_string();
                    (id, self.restore(snapshot).await)
                }
            };

            let Some(item) = outcome.results.iter_mut().find(|r| r.index == index) else {
                continue;
            };
            match result {
                Ok(()) => item.rolled_back = true,
                Err(err) => {
                    let problem = err.into_problem();
                    error!(
                        collection = collection.as_str(),
                        index,
                        id = %id,
                        error = %problem.detail,
                        "compensation failed"
                    );
                    item.rollback_error = Some(problem.detail);
                }
            }
        }
    }

    async fn create_one(
        &self,
        tenant: &TenantContext,
        collection: BatchCollection,
        item: serde_json::Value,
    ) -> Result<String, ApiError> {
        let inventory = &self.inventory;
        match collection {
            BatchCollection::Resources => {
                let input: ResourceInput = parse_item(item)?;
                Ok(inventory.create_resource(tenant, input).await?.resource_id)
            }
            BatchCollection::ResourcePools => {
                let input: ResourcePoolInput = parse_item(item)?;
                Ok(inventory.create_resource_pool(input).await?.resource_pool_id)
            }
            BatchCollection::Subscriptions => {
                let input: SubscriptionInput = parse_item(item)?;
                Ok(inventory.create_subscription(tenant, input).await?.subscription_id)
            }
        }
    }

    async fn delete_one(
        &self,
        tenant: &TenantContext,
        collection: BatchCollection,
        id: &str,
    ) -> Result<(), ApiError> {
        match collection {
            BatchCollection::Resources => self.inventory.delete_resource(tenant, id).await,
            BatchCollection::ResourcePools => self.inventory.delete_resource_pool(id).await,
            BatchCollection::Subscriptions => self.inventory.delete_subscription(tenant, id).await,
        }
    }

    async fn snapshot(
        &self,
        tenant: &TenantContext,
        collection: BatchCollection,
        id: &str,
    ) -> Result<Snapshot, ApiError> {
        Ok(match collection {
            BatchCollection::Resources => {
                Snapshot::Resource(self.inventory.get_resource(tenant, id).await?)
            }
            BatchCollection::ResourcePools => {
                Snapshot::Pool(self.inventory.get_resource_pool(id).await?)
            }
            BatchCollection::Subscriptions => {
                Snapshot::Subscription(self.inventory.get_subscription(tenant, id).await?)
            }
        })
    }

    async fn restore(&self, snapshot: Snapshot) -> Result<(), ApiError> {
        match snapshot {
            Snapshot::Resource(r) => self.inventory.restore_resource(r).await,
            Snapshot::Pool(p) => self.inventory.restore_resource_pool(p).await,
            Snapshot::Subscription(s) => self.inventory.restore_subscription(s).await,
        }
    }
}

fn parse_item<T: DeserializeOwned>(item: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(item).map_err(|e| ApiError::validation(format!("malformed item: {e}")))
}

/// Result of an atomic delete whose pre-check failed: nothing was touched.
fn aborted(ids: &[String], mut missing: Vec<(usize, ApiError)>) -> BatchOutcome {
    let results = ids
        .iter()
        .enumerate()
        .map(|(index, id)| {
            match missing.iter().position(|(i, _)| *i == index) {
                Some(pos) => {
                    let (_, err) = missing.swap_remove(pos);
                    BatchItemResult::failed(index, Some(id.clone()), err)
                }
                None => BatchItemResult {
                    index,
                    success: false,
                    id: Some(id.clone()),
                    error: Some("not attempted: atomic batch aborted".to_string()),
                    rolled_back: false,
                    rollback_error: None,
                },
            }
        })
        .collect();
    BatchOutcome::new(true, results)
}
