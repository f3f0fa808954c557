//! TTL cache of exchanged access tokens, keyed by [`ResolvedOAuth::cache_identity`]
//! and protected by a singleflight: concurrent requests for the same key
//! share one in-flight exchange instead of hammering the token endpoint.
//!
//! The teacher keeps OAuth state in a `static OnceLock<Mutex<HashMap<String,
//! OAuthState>>>` (`providers/codex/oauth.rs`). This cache follows the same
//! "global map behind a mutex" shape but replaces the mutex-held critical
//! section around the actual network call with a `tokio::sync::watch`
//! channel, so lock hold time never spans an await point.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::client::{exchange, ExchangeError};
use crate::config::ResolvedOAuth;
use crate::persist::{load_token, persist_token};

#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, skew: Duration) -> bool {
        Instant::now() + skew < self.expires_at
    }
}

#[derive(Debug, Clone)]
enum ExchangeOutcome {
    Ready(CachedToken),
    Failed(String),
}

enum Slot {
    /// An exchange is in flight; waiters subscribe to the watch channel.
    InFlight(watch::Receiver<Option<ExchangeOutcome>>),
    Done(CachedToken),
}

#[derive(Default)]
pub struct TokenCache {
    slots: Mutex<HashMap<String, Slot>>,
    persist_dir: Option<PathBuf>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self { slots: Mutex::new(HashMap::new()), persist_dir: None }
    }

    /// Enables writing exchanged tokens to `dir` and reading them back
    /// across restarts. Disabled (the default) when unset.
    pub fn with_persist_dir(dir: PathBuf) -> Self {
        Self { slots: Mutex::new(HashMap::new()), persist_dir: Some(dir) }
    }

    /// Returns a valid access token for `oauth`, refreshing it if absent or
    /// within `oauth.refresh_skew` of expiry. At most one exchange per cache
    /// key runs at a time; other callers await its result.
    pub async fn get(&self, oauth: &ResolvedOAuth) -> Result<CachedToken, ExchangeError> {
        let key = oauth.cache_identity();

        let rx_or_owner = {
            let mut guard = self.slots.lock().unwrap();
            match guard.get(&key) {
                Some(Slot::Done(token)) if token.is_fresh(oauth.refresh_skew) => {
                    return Ok(token.clone());
                }
                Some(Slot::InFlight(rx)) => Some(Err(rx.clone())),
                _ => {
                    let (tx, rx) = watch::channel(None);
                    guard.insert(key.clone(), Slot::InFlight(rx));
                    Some(Ok(tx))
                }
            }
        };

        let tx = match rx_or_owner {
            Some(Ok(tx)) => tx,
            Some(Err(mut rx)) => loop {
                if rx.changed().await.is_err() {
                    return Err(ExchangeError::Other("oauth exchange owner dropped".into()));
                }
                match rx.borrow().clone() {
                    Some(ExchangeOutcome::Ready(token)) => return Ok(token),
                    Some(ExchangeOutcome::Failed(msg)) => return Err(ExchangeError::Other(msg)),
                    None => continue,
                }
            },
            None => unreachable!(),
        };

        if let Some(dir) = &self.persist_dir {
            if let Some(token) = load_token(dir, &key).await {
                if token.is_fresh(oauth.refresh_skew) {
                    let mut guard = self.slots.lock().unwrap();
                    guard.insert(key.clone(), Slot::Done(token.clone()));
                    drop(guard);
                    let _ = tx.send(Some(ExchangeOutcome::Ready(token.clone())));
                    return Ok(token);
                }
            }
        }

        let outcome = match exchange(oauth).await {
            Ok(token) => ExchangeOutcome::Ready(token),
            Err(err) => ExchangeOutcome::Failed(err.to_string()),
        };
        let mut guard = self.slots.lock().unwrap();
        match &outcome {
            ExchangeOutcome::Ready(token) => {
                guard.insert(key.clone(), Slot::Done(token.clone()));
            }
            ExchangeOutcome::Failed(_) => {
                guard.remove(&key);
            }
        }
        drop(guard);
        let _ = tx.send(Some(outcome.clone()));

        match outcome {
            ExchangeOutcome::Ready(token) => {
                if let Some(dir) = &self.persist_dir {
                    if let Err(err) = persist_token(dir, &key, &token).await {
                        tracing::warn!(error = %err, "failed to persist oauth token");
                    }
                }
                Ok(token)
            }
            ExchangeOutcome::Failed(msg) => Err(ExchangeError::Other(msg)),
        }
    }

    /// Forces the next `get` for this key to re-exchange.
    pub fn invalidate(&self, oauth: &ResolvedOAuth) {
        self.slots.lock().unwrap().remove(&oauth.cache_identity());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OAuthConfig, OAuthMode};

    #[test]
    fn fresh_token_survives_skew_check() {
        let token = CachedToken {
            access_token: "t".into(),
            token_type: "Bearer".into(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        assert!(token.is_fresh(Duration::from_secs(60)));
    }

    #[test]
    fn expiring_token_fails_skew_check() {
        let token = CachedToken {
            access_token: "t".into(),
            token_type: "Bearer".into(),
            expires_at: Instant::now() + Duration::from_secs(10),
        };
        assert!(!token.is_fresh(Duration::from_secs(60)));
    }

    #[test]
    fn invalidate_on_empty_cache_is_noop() {
        let cache = TokenCache::new();
        let cfg = OAuthConfig { mode: Some(OAuthMode::OpenAI), refresh_token: Some("rt".into()), ..Default::default() };
        cache.invalidate(&cfg.resolve().unwrap());
    }
}
