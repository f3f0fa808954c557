//! Outer HTTP surface: the axum routers the host binary mounts.
//!
//! Maps inbound paths to the engine in `onr-core` and to the admin API;
//! holds no engine logic of its own.

pub mod admin;
pub mod proxy;

pub use admin::{AdminState, admin_router};
pub use proxy::{ProxyState, proxy_router};
