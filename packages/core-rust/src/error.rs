//! Error kinds reported by backend collaborators.
//!
//! "Not found" and "already exists" are distinct variants so the gateway can
//! map them to 404/409 without inspecting error text.

use std::fmt;

/// Kind of object an error refers to, used in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Resource,
    ResourcePool,
    ResourceType,
    DeploymentManager,
    Subscription,
    Deployment,
    Workflow,
    Execution,
}

impl ObjectKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::ResourcePool => "resource pool",
            Self::ResourceType => "resource type",
            Self::DeploymentManager => "deployment manager",
            Self::Subscription => "subscription",
            Self::Deployment => "deployment",
            Self::Workflow => "workflow",
            Self::Execution => "execution",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by infrastructure backends (adapters, deployment
/// backends, orchestration plugins).
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ObjectKind, id: String },
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: ObjectKind, id: String },
    #[error("operation not supported by backend: {0}")]
    Unsupported(&'static str),
    #[error("backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

impl AdapterError {
    #[must_use]
    pub fn not_found(kind: ObjectKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn already_exists(kind: ObjectKind, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }
}

/// Errors returned by the subscription metadata store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("subscription '{0}' not found")]
    NotFound(String),
    #[error("subscription '{0}' already exists")]
    AlreadyExists(String),
    #[error("store failure: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type AdapterResult<T> = Result<T, AdapterError>;
pub type StoreResult<T> = Result<T, StoreError>;
