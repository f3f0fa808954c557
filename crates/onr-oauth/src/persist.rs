//! Optional disk persistence for cached tokens: `dir/{hash}.json.tmp` then
//! `rename` into `dir/{hash}.json`, the same atomic-write idiom the host
//! project uses elsewhere for config/state persistence.

use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

use crate::cache::CachedToken;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error persisting oauth token: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize oauth token: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct OnDiskToken {
    access_token: String,
    token_type: String,
    /// Unix epoch seconds, since `Instant` has no stable cross-process form.
    expires_at_unix: u64,
}

pub fn cache_file_name(cache_identity: &str) -> String {
    format!("{}.json", blake3::hash(cache_identity.as_bytes()).to_hex())
}

pub async fn persist_token(dir: &Path, cache_identity: &str, token: &CachedToken) -> Result<(), PersistError> {
    let now_instant = Instant::now();
    let now_system = SystemTime::now();
    let remaining = token.expires_at.saturating_duration_since(now_instant);
    let expires_at_unix = now_system
        .checked_add(remaining)
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let on_disk = OnDiskToken {
        access_token: token.access_token.clone(),
        token_type: token.token_type.clone(),
        expires_at_unix,
    };
    let json = serde_json::to_vec_pretty(&on_disk)?;

    let final_path = dir.join(cache_file_name(cache_identity));
    let tmp_path = dir.join(format!("{}.tmp", cache_file_name(cache_identity)));

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, &final_path).await?;
    Ok(())
}

pub async fn load_token(dir: &Path, cache_identity: &str) -> Option<CachedToken> {
    let path = dir.join(cache_file_name(cache_identity));
    let bytes = tokio::fs::read(&path).await.ok()?;
    let on_disk: OnDiskToken = serde_json::from_slice(&bytes).ok()?;

    let expires_at_system = SystemTime::UNIX_EPOCH + Duration::from_secs(on_disk.expires_at_unix);
    let remaining = expires_at_system.duration_since(SystemTime::now()).ok()?;
    if remaining.is_zero() {
        return None;
    }

    Some(CachedToken {
        access_token: on_disk.access_token,
        token_type: on_disk.token_type,
        expires_at: Instant::now() + remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_file_name_is_stable_hex() {
        let a = cache_file_name("mode|url|form");
        let b = cache_file_name("mode|url|form");
        assert_eq!(a, b);
        assert!(a.ends_with(".json"));
    }

    #[test]
    fn different_identities_hash_differently() {
        assert_ne!(cache_file_name("a"), cache_file_name("b"));
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("onr-oauth-test-{}", cache_file_name("round-trip")));
        let token = CachedToken {
            access_token: "abc".into(),
            token_type: "Bearer".into(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        persist_token(&dir, "round-trip", &token).await.unwrap();
        let loaded = load_token(&dir, "round-trip").await.unwrap();
        assert_eq!(loaded.access_token, "abc");
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
