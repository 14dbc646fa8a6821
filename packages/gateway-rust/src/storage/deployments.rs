//! In-memory deployment backend.
//!
//! Deployments become `Deployed` immediately; nothing is actually installed.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use ocloud_core::{
    AdapterError, AdapterResult, Backend, Capability, Deployment, DeploymentBackend,
    DeploymentRequest, DeploymentStatus, ObjectKind,
};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::storage::table::Table;

pub struct MemoryDeploymentBackend {
    deployments: Table<Deployment>,
    /// Serializes the name-uniqueness check with the insert.
    create_lock: Mutex<()>,
    closed: AtomicBool,
}

impl MemoryDeploymentBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            deployments: Table::new(),
            create_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for MemoryDeploymentBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryDeploymentBackend {
    async fn health(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.closed.load(Ordering::SeqCst), "deployment backend is closed");
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn capabilities(&self) -> BTreeSet<Capability> {
        BTreeSet::from([Capability::Deployments])
    }
}

#[async_trait]
impl DeploymentBackend for MemoryDeploymentBackend {
    async fn list_deployments(&self) -> AdapterResult<Vec<Deployment>> {
        Ok(self.deployments.list())
    }

    async fn get_deployment(&self, id: &str) -> AdapterResult<Deployment> {
        self.deployments
            .get(id)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::Deployment, id))
    }

    /// Names are unique per namespace.
    async fn create_deployment(&self, request: DeploymentRequest) -> AdapterResult<Deployment> {
        let _guard = self.create_lock.lock();
        let taken = self
            .deployments
            .any(|d| d.name == request.name && d.namespace == request.namespace);
        if taken {
            return Err(AdapterError::already_exists(ObjectKind::Deployment, request.name));
        }

        let deployment = Deployment {
            deployment_id: Uuid::new_v4().to_string(),
            name: request.name,
            description: request.description.unwrap_or_default(),
            package_ref: request.package_ref,
            namespace: request.namespace,
            status: DeploymentStatus::Deployed,
            values: request.values,
            created_at: Utc::now(),
        };
        let id = deployment.deployment_id.clone();
        self.deployments
            .insert_new(&id, deployment)
            .map_err(|_| AdapterError::already_exists(ObjectKind::Deployment, id))
    }

    async fn delete_deployment(&self, id: &str) -> AdapterResult<()> {
        self.deployments
            .remove(id)
            .map(drop)
            .ok_or_else(|| AdapterError::not_found(ObjectKind::Deployment, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, namespace: Option<&str>) -> DeploymentRequest {
        DeploymentRequest {
            name: name.into(),
            package_ref: "oci://charts/du:1.2.0".into(),
            namespace: namespace.map(str::to_string),
            ..DeploymentRequest::default()
        }
    }

    #[tokio::test]
    async fn names_are_unique_per_namespace() {
        let backend = MemoryDeploymentBackend::new();
        let first = backend.create_deployment(request("du", Some("ran"))).await.unwrap();
        assert_eq!(first.status, DeploymentStatus::Deployed);

        assert!(matches!(
            backend.create_deployment(request("du", Some("ran"))).await,
            Err(AdapterError::AlreadyExists { .. })
        ));
        backend.create_deployment(request("du", Some("core"))).await.unwrap();
        assert_eq!(backend.list_deployments().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let backend = MemoryDeploymentBackend::new();
        let d = backend.create_deployment(request("cu", None)).await.unwrap();
        backend.delete_deployment(&d.deployment_id).await.unwrap();
        assert!(matches!(
            backend.get_deployment(&d.deployment_id).await,
            Err(AdapterError::NotFound { kind: ObjectKind::Deployment, .. })
        ));
    }
}
