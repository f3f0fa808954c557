//! Host integration (§4.11): boot sequence, shared request-scoped state, the
//! upstream HTTP client, and the proxy engine that strings routing, request
//! transform, OAuth, response/SSE transform, and metrics extraction together
//! around a single inbound call.

pub mod bootstrap;
pub mod proxy_engine;
pub mod state;
pub mod upstream_client;

pub use bootstrap::{Bootstrap, CliArgs, bootstrap, bootstrap_from_env};
pub use state::{AppState, CredentialInsertInput, ProviderRuntime};
