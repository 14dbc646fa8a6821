//! Orchestration-plugin dispatch over the plugin registry.

use std::sync::Arc;

use ocloud_core::{
    Capability, OrchestrationPlugin, WorkflowDescriptor, WorkflowExecution, WorkflowRequest,
};
use tracing::info;

use crate::registry::{EntrySummary, Registry};
use crate::service::error::ApiError;

pub struct PluginService {
    plugins: Arc<Registry<dyn OrchestrationPlugin>>,
}

impl PluginService {
    #[must_use]
    pub fn new(plugins: Arc<Registry<dyn OrchestrationPlugin>>) -> Self {
        Self { plugins }
    }

    #[must_use]
    pub fn plugins(&self) -> &Arc<Registry<dyn OrchestrationPlugin>> {
        &self.plugins
    }

    fn plugin(&self, name: &str) -> Result<Arc<dyn OrchestrationPlugin>, ApiError> {
        if self.plugins.is_empty() {
            return Err(ApiError::ServiceUnavailable(
                "no orchestration plugins are registered".to_string(),
            ));
        }
        Ok(self.plugins.select(Some(name), Capability::Workflows)?.backend)
    }

    /// # Errors
    ///
    /// `ServiceUnavailable` when no plugin is registered or the registry is shut down.
    pub fn list_plugins(&self) -> Result<Vec<EntrySummary>, ApiError> {
        if self.plugins.is_sealed() || self.plugins.is_empty() {
            return Err(ApiError::ServiceUnavailable(
                "no orchestration plugins are registered".to_string(),
            ));
        }
        Ok(self.plugins.list().iter().map(|e| e.summary()).collect())
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown plugin.
    pub async fn list_workflows(&self, plugin: &str) -> Result<Vec<WorkflowDescriptor>, ApiError> {
        Ok(self.plugin(plugin)?.list_workflows().await?)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown plugin or workflow.
    pub async fn execute(
        &self,
        plugin: &str,
        workflow: &str,
        request: WorkflowRequest,
    ) -> Result<WorkflowExecution, ApiError> {
        let execution = self.plugin(plugin)?.execute_workflow(workflow, request).await?;
        info!(plugin, workflow, execution_id = %execution.execution_id, "started workflow");
        Ok(execution)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown plugin or execution.
    pub async fn get_execution(
        &self,
        plugin: &str,
        execution_id: &str,
    ) -> Result<WorkflowExecution, ApiError> {
        Ok(self.plugin(plugin)?.get_execution(execution_id).await?)
    }
}
