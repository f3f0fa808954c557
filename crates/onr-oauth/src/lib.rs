//! Refresh-token -> access-token exchange, TTL cache with singleflight, and
//! optional disk persistence for the providers the routing engine speaks to
//! over OAuth instead of a static API key.

pub mod cache;
pub mod client;
pub mod config;
pub mod persist;

pub use cache::{CachedToken, TokenCache};
pub use client::{exchange, ExchangeError};
pub use config::{ContentType, HttpMethod, OAuthConfig, OAuthConfigError, OAuthMode, ResolvedOAuth};
pub use persist::{cache_file_name, load_token, persist_token, PersistError};
