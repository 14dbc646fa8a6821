//! In-memory reference backends.
//!
//! - [`MemoryAdapter`]: inventory [`Adapter`](ocloud_core::Adapter)
//! - [`MemorySubscriptionStore`]: subscription metadata store
//! - [`MemoryDeploymentBackend`]: deployment lifecycle backend
//!
//! All three are built on a `DashMap` table whose create path checks and
//! inserts atomically.

pub mod adapter;
pub mod deployments;
pub mod subscriptions;
mod table;

pub use adapter::MemoryAdapter;
pub use deployments::MemoryDeploymentBackend;
pub use subscriptions::MemorySubscriptionStore;
