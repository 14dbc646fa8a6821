//! HTTP surface: configuration, middleware, handlers, and server lifecycle.

pub mod config;
pub mod handlers;
pub mod load_shed;
pub mod middleware;
pub mod module;
pub mod shutdown;
pub mod tenant;
pub mod version;

pub use config::*;
pub use handlers::AppState;
pub use module::{build_router, NetworkModule};
pub use shutdown::*;
pub use version::VersionTable;
