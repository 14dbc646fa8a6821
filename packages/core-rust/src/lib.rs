//! O-Cloud gateway core: the inventory data model, validation rules, API
//! version lifecycle, tenant context, and the contracts pluggable backends
//! implement.

pub mod context;
pub mod error;
pub mod requests;
pub mod traits;
pub mod types;
pub mod validation;
pub mod version;

pub use context::{TenantContext, DEFAULT_TENANT};
pub use error::{AdapterError, AdapterResult, ObjectKind, StoreError, StoreResult};
pub use requests::{
    BatchRequest, DeploymentRequest, FilterPatch, ResourceInput, ResourcePoolInput,
    SubscriptionInput, SubscriptionUpdate, WorkflowRequest,
};
pub use traits::{Adapter, Backend, DeploymentBackend, OrchestrationPlugin, SubscriptionStore};
pub use types::{
    Capability, Deployment, DeploymentManager, DeploymentStatus, ExecutionStatus, Extensions,
    Resource, ResourcePool, ResourceType, Subscription, SubscriptionFilter, WorkflowDescriptor,
    WorkflowExecution,
};
pub use validation::{ValidationResult, Validator};
pub use version::{ApiVersion, VersionStatus};
