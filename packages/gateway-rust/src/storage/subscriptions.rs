//! In-memory subscription metadata store.

use async_trait::async_trait;
use ocloud_core::{StoreError, StoreResult, Subscription, SubscriptionStore};

use crate::storage::table::{Table, TableError};

/// Subscription metadata kept in process memory; lost on restart.
pub struct MemorySubscriptionStore {
    rows: Table<Subscription>,
}

impl MemorySubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self { rows: Table::new() }
    }
}

impl Default for MemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn store_error(id: &str, err: TableError) -> StoreError {
    match err {
        TableError::Exists => StoreError::AlreadyExists(id.to_string()),
        TableError::Missing => StoreError::NotFound(id.to_string()),
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn create(&self, subscription: &Subscription) -> StoreResult<()> {
        let id = &subscription.subscription_id;
        self.rows
            .insert_new(id, subscription.clone())
            .map(drop)
            .map_err(|e| store_error(id, e))
    }

    async fn get(&self, id: &str) -> StoreResult<Subscription> {
        self.rows
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(&self, subscription: &Subscription) -> StoreResult<()> {
        let id = &subscription.subscription_id;
        self.rows
            .replace(id, subscription.clone())
            .map(drop)
            .map_err(|e| store_error(id, e))
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.rows
            .remove(id)
            .map(drop)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<Subscription>> {
        Ok(self.rows.list())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
