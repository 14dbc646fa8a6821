//! Subscription operations of the inventory engine.
//!
//! A subscription lives in two places: the adapter's event source and the
//! metadata store. The store is authoritative for reads. Creation and update
//! write the adapter first and undo that write if the store write fails.

use ocloud_core::validation::MAX_ID_CHARS;
use ocloud_core::{
    AdapterError, Capability, FilterPatch, StoreError, Subscription, SubscriptionFilter,
    SubscriptionInput, SubscriptionUpdate, TenantContext, Validator,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::service::error::ApiError;
use crate::service::inventory::InventoryService;

impl InventoryService {
    /// # Errors
    ///
    /// Store failures.
    pub async fn list_subscriptions(
        &self,
        tenant: &TenantContext,
    ) -> Result<Vec<Subscription>, ApiError> {
        let mut subscriptions = self.store.list().await?;
        subscriptions.retain(|s| tenant.can_access(s.tenant_id.as_deref()));
        Ok(subscriptions)
    }

    /// Another tenant's subscription is reported exactly like a missing one.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent or not visible to `tenant`.
    pub async fn get_subscription(
        &self,
        tenant: &TenantContext,
        id: &str,
    ) -> Result<Subscription, ApiError> {
        let subscription = self.store.get(id).await?;
        if tenant.can_access(subscription.tenant_id.as_deref()) {
            Ok(subscription)
        } else {
            Err(StoreError::NotFound(id.to_string()).into())
        }
    }

    /// Validates the callback, registers with the adapter, then persists.
    ///
    /// # Errors
    ///
    /// `Validation` for a rejected callback, `Internal` when persisting
    /// fails (after the adapter copy has been cleaned up).
    pub async fn create_subscription(
        &self,
        tenant: &TenantContext,
        input: SubscriptionInput,
    ) -> Result<Subscription, ApiError> {
        check_consumer_id(input.consumer_subscription_id.as_deref())?;
        self.callbacks.validate(&input.callback).await?;

        let adapter = self.adapter(Capability::Subscriptions)?;
        let subscription = Subscription {
            subscription_id: Uuid::new_v4().to_string(),
            callback: input.callback,
            consumer_subscription_id: input.consumer_subscription_id,
            filter: input.filter.filter(|f| !f.is_empty()),
            tenant_id: Some(tenant.tenant_id.clone()),
        };

        let mut created = adapter.create_subscription(subscription).await?;
        created.tenant_id = Some(tenant.tenant_id.clone());

        if let Err(e) = self.store.create(&created).await {
            error!(
                subscription_id = %created.subscription_id,
                error = %e,
                "persisting subscription failed; removing adapter copy"
            );
            if let Err(cleanup) = adapter.delete_subscription(&created.subscription_id).await {
                error!(
                    subscription_id = %created.subscription_id,
                    error = %cleanup,
                    "orphaned adapter subscription could not be removed"
                );
            }
            return Err(ApiError::Internal(anyhow::Error::new(e).context(format!(
                "persisting subscription '{}'",
                created.subscription_id
            ))));
        }

        info!(subscription_id = %created.subscription_id, tenant = %tenant.tenant_id, "created subscription");
        Ok(created)
    }

    /// Applies a partial update; the effective callback is always re-validated.
    ///
    /// `filter` omitted keeps the current filter, `null` or `{}` clears it.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, adapter failures, or `Internal` when
    /// persisting fails (after the adapter copy has been restored).
    pub async fn update_subscription(
        &self,
        tenant: &TenantContext,
        id: &str,
        update: SubscriptionUpdate,
    ) -> Result<Subscription, ApiError> {
        let existing = self.get_subscription(tenant, id).await?;
        let previous = existing.clone();
        check_consumer_id(update.consumer_subscription_id.as_deref())?;

        let patch = update.filter_patch();
        let callback = update.callback.unwrap_or(existing.callback);
        self.callbacks.validate(&callback).await?;

        let filter: Option<SubscriptionFilter> = match patch {
            FilterPatch::Keep => existing.filter,
            FilterPatch::Clear => None,
            FilterPatch::Replace(filter) => Some(filter),
        };
        let next = Subscription {
            subscription_id: existing.subscription_id,
            callback,
            consumer_subscription_id: update
                .consumer_subscription_id
                .or(existing.consumer_subscription_id),
            filter,
            tenant_id: existing.tenant_id,
        };

        let adapter = self.adapter(Capability::Subscriptions)?;
        let mut updated = adapter.update_subscription(next.clone()).await?;
        updated.tenant_id = next.tenant_id;

        if let Err(e) = self.store.update(&updated).await {
            error!(
                subscription_id = %updated.subscription_id,
                error = %e,
                "persisting subscription update failed; restoring adapter copy"
            );
            if let Err(restore) = adapter.update_subscription(previous).await {
                error!(
                    subscription_id = %updated.subscription_id,
                    error = %restore,
                    "adapter subscription could not be restored"
                );
            }
            return Err(ApiError::Internal(anyhow::Error::new(e).context(format!(
                "persisting update of subscription '{}'",
                updated.subscription_id
            ))));
        }
        Ok(updated)
    }

    /// Removes the adapter copy and the stored metadata.
    ///
    /// An adapter that has already forgotten the subscription is not an
    /// error; the metadata is still removed.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent or not visible; other adapter or store failures.
    pub async fn delete_subscription(&self, tenant: &TenantContext, id: &str) -> Result<(), ApiError> {
        self.get_subscription(tenant, id).await?;
        let adapter = self.adapter(Capability::Subscriptions)?;
        match adapter.delete_subscription(id).await {
            Ok(()) => {}
            Err(AdapterError::NotFound { .. }) => {
                warn!(subscription_id = id, "adapter had no copy of subscription");
            }
            Err(e) => return Err(e.into()),
        }
        self.store.delete(id).await?;
        info!(subscription_id = id, tenant = %tenant.tenant_id, "deleted subscription");
        Ok(())
    }

    /// Re-creates a deleted subscription from its snapshot.
    pub(crate) async fn restore_subscription(&self, snapshot: Subscription) -> Result<(), ApiError> {
        let adapter = self.adapter(Capability::Subscriptions)?;
        adapter.create_subscription(snapshot.clone()).await?;
        self.store.create(&snapshot).await?;
        Ok(())
    }
}

fn check_consumer_id(consumer_id: Option<&str>) -> Result<(), ApiError> {
    let mut v = Validator::new();
    if let Some(consumer_id) = consumer_id {
        v.max_chars("consumerSubscriptionId", consumer_id, MAX_ID_CHARS);
    }
    ApiError::check(v.finish())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use ocloud_core::{Adapter, StoreResult, SubscriptionStore};

    use super::*;
    use crate::registry::Registry;
    use crate::service::callback::tests::StaticResolver;
    use crate::service::callback::{default_blocked_ranges, CallbackValidator};
    use crate::service::inventory::tests::service;
    use crate::storage::{MemoryAdapter, MemorySubscriptionStore};

    fn input(callback: &str) -> SubscriptionInput {
        SubscriptionInput {
            callback: callback.to_string(),
            consumer_subscription_id: Some("smo-1".into()),
            filter: Some(SubscriptionFilter {
                resource_pool_ids: vec!["pool-a".into()],
                ..SubscriptionFilter::default()
            }),
        }
    }

    #[tokio::test]
    async fn create_persists_and_registers() {
        let svc = service();
        let tenant = TenantContext::new("alpha");
        let sub = svc
            .create_subscription(&tenant, input("https://hooks.example.com/notify"))
            .await
            .unwrap();

        assert_eq!(sub.tenant_id.as_deref(), Some("alpha"));
        let stored = svc.store().get(&sub.subscription_id).await.unwrap();
        assert_eq!(stored, sub);
        let adapter = svc.adapters().get_default().unwrap();
        assert!(adapter.get_subscription(&sub.subscription_id).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_callbacks_create_nothing() {
        let svc = service();
        let tenant = TenantContext::default();
        for cb in ["http://localhost/x", "http://127.0.0.1/x", "ftp://example.com/x"] {
            let err = svc.create_subscription(&tenant, input(cb)).await.unwrap_err();
            assert!(matches!(err, ApiError::Validation { .. }), "{cb}");
        }
        assert!(svc.list_subscriptions(&tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_filter_is_stored_as_none() {
        let svc = service();
        let mut payload = input("https://hooks.example.com/notify");
        payload.filter = Some(SubscriptionFilter::default());
        let sub = svc
            .create_subscription(&TenantContext::default(), payload)
            .await
            .unwrap();
        assert!(sub.filter.is_none());
    }

    #[tokio::test]
    async fn cross_tenant_access_looks_like_absence() {
        let svc = service();
        let owner = TenantContext::new("alpha");
        let other = TenantContext::new("beta");
        let sub = svc
            .create_subscription(&owner, input("https://hooks.example.com/notify"))
            .await
            .unwrap();

        let foreign = svc.get_subscription(&other, &sub.subscription_id).await.unwrap_err();
        let missing = svc.get_subscription(&other, "no-such-id").await.unwrap_err();
        assert!(matches!(foreign, ApiError::NotFound(_)));
        assert!(matches!(missing, ApiError::NotFound(_)));
        assert_eq!(
            foreign.to_string().replace(&sub.subscription_id, "ID"),
            missing.to_string().replace("no-such-id", "ID")
        );

        assert!(svc.list_subscriptions(&other).await.unwrap().is_empty());
        assert!(svc.delete_subscription(&other, &sub.subscription_id).await.is_err());
        assert!(svc.get_subscription(&owner, &sub.subscription_id).await.is_ok());
    }

    #[tokio::test]
    async fn filter_patch_semantics() {
        let svc = service();
        let tenant = TenantContext::default();
        let sub = svc
            .create_subscription(&tenant, input("https://hooks.example.com/notify"))
            .await
            .unwrap();
        let id = sub.subscription_id.clone();

        let kept = svc
            .update_subscription(
                &tenant,
                &id,
                SubscriptionUpdate { consumer_subscription_id: Some("smo-2".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(kept.filter, sub.filter);
        assert_eq!(kept.consumer_subscription_id.as_deref(), Some("smo-2"));

        let cleared: SubscriptionUpdate = serde_json::from_str(r#"{"filter": {}}"#).unwrap();
        let cleared = svc.update_subscription(&tenant, &id, cleared).await.unwrap();
        assert!(cleared.filter.is_none());
        assert!(svc.store().get(&id).await.unwrap().filter.is_none());
    }

    #[tokio::test]
    async fn update_revalidates_callback() {
        let svc = service();
        let tenant = TenantContext::default();
        let sub = svc
            .create_subscription(&tenant, input("https://hooks.example.com/notify"))
            .await
            .unwrap();
        let err = svc
            .update_subscription(
                &tenant,
                &sub.subscription_id,
                SubscriptionUpdate { callback: Some("http://10.0.0.8/steal".into()), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
        assert_eq!(svc.store().get(&sub.subscription_id).await.unwrap().callback, sub.callback);
    }

    #[tokio::test]
    async fn delete_removes_both_copies() {
        let svc = service();
        let tenant = TenantContext::default();
        let sub = svc
            .create_subscription(&tenant, input("https://hooks.example.com/notify"))
            .await
            .unwrap();
        svc.delete_subscription(&tenant, &sub.subscription_id).await.unwrap();

        assert!(matches!(
            svc.get_subscription(&tenant, &sub.subscription_id).await,
            Err(ApiError::NotFound(_))
        ));
        let adapter = svc.adapters().get_default().unwrap();
        assert!(adapter.get_subscription(&sub.subscription_id).await.is_err());
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl SubscriptionStore for BrokenStore {
        async fn create(&self, _: &Subscription) -> StoreResult<()> {
            Err(anyhow::anyhow!("disk full").into())
        }
        async fn get(&self, id: &str) -> StoreResult<Subscription> {
            Err(StoreError::NotFound(id.to_string()))
        }
        async fn update(&self, _: &Subscription) -> StoreResult<()> {
            Err(anyhow::anyhow!("disk full").into())
        }
        async fn delete(&self, id: &str) -> StoreResult<()> {
            Err(StoreError::NotFound(id.to_string()))
        }
        async fn list(&self) -> StoreResult<Vec<Subscription>> {
            Ok(Vec::new())
        }
        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn store_failure_cleans_up_adapter_copy() {
        let adapter = Arc::new(MemoryAdapter::new());
        let registry: Arc<Registry<dyn Adapter>> = Arc::new(Registry::new("adapter"));
        registry.register_backend("memory", Arc::clone(&adapter) as Arc<dyn Adapter>, true).unwrap();
        let resolver = StaticResolver::default().with("hooks.example.com", &["93.184.216.34"]);
        let svc = InventoryService::new(
            registry,
            Arc::new(BrokenStore),
            Arc::new(CallbackValidator::new(default_blocked_ranges(), Arc::new(resolver))),
        );

        let err = svc
            .create_subscription(&TenantContext::default(), input("https://hooks.example.com/notify"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(adapter.subscription_count(), 0);
    }

    /// Store that delegates everything except `update`, which fails.
    struct FrozenStore(MemorySubscriptionStore);

    #[async_trait]
    impl SubscriptionStore for FrozenStore {
        async fn create(&self, subscription: &Subscription) -> StoreResult<()> {
            self.0.create(subscription).await
        }
        async fn get(&self, id: &str) -> StoreResult<Subscription> {
            self.0.get(id).await
        }
        async fn update(&self, _: &Subscription) -> StoreResult<()> {
            Err(anyhow::anyhow!("read-only replica").into())
        }
        async fn delete(&self, id: &str) -> StoreResult<()> {
            self.0.delete(id).await
        }
        async fn list(&self) -> StoreResult<Vec<Subscription>> {
            self.0.list().await
        }
        async fn ping(&self) -> StoreResult<()> {
            self.0.ping().await
        }
    }

    #[tokio::test]
    async fn failed_update_persist_restores_adapter_copy() {
        let adapter = Arc::new(MemoryAdapter::new());
        let registry: Arc<Registry<dyn Adapter>> = Arc::new(Registry::new("adapter"));
        registry.register_backend("memory", Arc::clone(&adapter) as Arc<dyn Adapter>, true).unwrap();
        let resolver = StaticResolver::default()
            .with("a.example.com", &["93.184.216.34"])
            .with("b.example.com", &["93.184.216.35"]);
        let store = Arc::new(FrozenStore(MemorySubscriptionStore::new()));
        let svc = InventoryService::new(
            registry,
            Arc::clone(&store) as Arc<dyn SubscriptionStore>,
            Arc::new(CallbackValidator::new(default_blocked_ranges(), Arc::new(resolver))),
        );
        let tenant = TenantContext::default();
        let sub = svc
            .create_subscription(&tenant, input("https://a.example.com/n"))
            .await
            .unwrap();

        let err = svc
            .update_subscription(
                &tenant,
                &sub.subscription_id,
                SubscriptionUpdate { callback: Some("https://b.example.com/n".into()), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));

        let on_adapter = adapter.get_subscription(&sub.subscription_id).await.unwrap();
        let in_store = store.get(&sub.subscription_id).await.unwrap();
        assert_eq!(on_adapter.callback, "https://a.example.com/n");
        assert_eq!(in_store.callback, "https://a.example.com/n");
    }
}
