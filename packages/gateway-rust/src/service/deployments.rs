//! Deployment lifecycle dispatch over the deployment-backend registry.

use std::sync::Arc;

use ocloud_core::validation::{MAX_DESCRIPTION_CHARS, MAX_NAME_CHARS};
use ocloud_core::{Capability, Deployment, DeploymentBackend, DeploymentRequest, Validator};
use tracing::info;

use crate::registry::{EntrySummary, Registry};
use crate::service::error::ApiError;

pub struct DeploymentService {
    backends: Arc<Registry<dyn DeploymentBackend>>,
}

impl DeploymentService {
    #[must_use]
    pub fn new(backends: Arc<Registry<dyn DeploymentBackend>>) -> Self {
        Self { backends }
    }

    #[must_use]
    pub fn backends(&self) -> &Arc<Registry<dyn DeploymentBackend>> {
        &self.backends
    }

    /// Named backend, or the default when `name` is `None`.
    fn backend(&self, name: Option<&str>) -> Result<Arc<dyn DeploymentBackend>, ApiError> {
        Ok(self.backends.select(name, Capability::Deployments)?.backend)
    }

    #[must_use]
    pub fn list_backends(&self) -> Vec<EntrySummary> {
        self.backends.list().iter().map(|e| e.summary()).collect()
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown backend, `ServiceUnavailable` without a default.
    pub async fn list(&self, backend: Option<&str>) -> Result<Vec<Deployment>, ApiError> {
        Ok(self.backend(backend)?.list_deployments().await?)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown backend or deployment.
    pub async fn get(&self, backend: Option<&str>, id: &str) -> Result<Deployment, ApiError> {
        Ok(self.backend(backend)?.get_deployment(id).await?)
    }

    /// # Errors
    ///
    /// `Validation` for a bad name, package or namespace; backend errors.
    pub async fn create(
        &self,
        backend: Option<&str>,
        request: DeploymentRequest,
    ) -> Result<Deployment, ApiError> {
        let mut v = Validator::new();
        v.require("name", Some(&request.name));
        v.max_chars("name", &request.name, MAX_NAME_CHARS);
        v.require("packageRef", Some(&request.package_ref));
        if let Some(description) = request.description.as_deref() {
            v.max_chars("description", description, MAX_DESCRIPTION_CHARS);
        }
        if let Some(namespace) = request.namespace.as_deref() {
            v.dns_label("namespace", namespace);
        }
        ApiError::check(v.finish())?;

        let target = self.backend(backend)?;
        let deployment = target.create_deployment(request).await?;
        info!(
            deployment_id = %deployment.deployment_id,
            name = %deployment.name,
            backend = backend.unwrap_or("default"),
            "created deployment"
        );
        Ok(deployment)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown backend or deployment.
    pub async fn delete(&self, backend: Option<&str>, id: &str) -> Result<(), ApiError> {
        self.backend(backend)?.delete_deployment(id).await?;
        info!(deployment_id = id, "deleted deployment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDeploymentBackend;

    fn service() -> DeploymentService {
        let registry: Arc<Registry<dyn DeploymentBackend>> =
            Arc::new(Registry::new("deployment backend"));
        registry
            .register_backend("helm", Arc::new(MemoryDeploymentBackend::new()), true)
            .unwrap();
        registry
            .register_backend("operator", Arc::new(MemoryDeploymentBackend::new()), false)
            .unwrap();
        DeploymentService::new(registry)
    }

    fn request(namespace: &str) -> DeploymentRequest {
        DeploymentRequest {
            name: "du-site-7".into(),
            package_ref: "oci://charts/du:1.2.0".into(),
            namespace: Some(namespace.into()),
            ..DeploymentRequest::default()
        }
    }

    #[tokio::test]
    async fn backend_selection() {
        let svc = service();
        svc.create(Some("operator"), request("ran")).await.unwrap();
        assert!(svc.list(None).await.unwrap().is_empty());
        assert_eq!(svc.list(Some("operator")).await.unwrap().len(), 1);
        assert!(matches!(svc.list(Some("nope")).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn namespace_must_be_dns_label() {
        let svc = service();
        let err = svc.create(None, request("Bad_NS")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[tokio::test]
    async fn name_and_package_are_required() {
        let svc = service();
        let err = svc.create(None, DeploymentRequest::default()).await.unwrap_err();
        let ApiError::Validation { errors } = err else { panic!("expected validation") };
        assert_eq!(errors, vec!["name is required", "packageRef is required"]);
    }

    #[tokio::test]
    async fn empty_registry_is_unavailable() {
        let svc = DeploymentService::new(Arc::new(Registry::new("deployment backend")));
        assert!(matches!(svc.list(None).await, Err(ApiError::ServiceUnavailable(_))));
        assert!(svc.list_backends().is_empty());
    }
}
