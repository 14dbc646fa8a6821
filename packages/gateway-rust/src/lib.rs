//! O-Cloud gateway: backend registries, the inventory engine, the batch
//! executor, and the versioned, tenant-aware HTTP surface in front of them.

pub mod network;
pub mod registry;
pub mod service;
pub mod storage;

pub use network::{NetworkConfig, NetworkModule};
pub use registry::{Registry, RegistryError};
pub use service::{GatewayConfig, Registries, Services};
