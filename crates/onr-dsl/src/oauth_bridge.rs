//! Bridges a [`crate::model::AuthDirectives`]'s declared `oauth { ... }`
//! block to [`onr_oauth`]'s `TokenCache`/`ResolvedOAuth`, resolving per the
//! same (api, stream) match precedence as everything else in a
//! [`crate::model::ProviderFile`].

use onr_oauth::{CachedToken, ExchangeError, OAuthConfig, OAuthConfigError, TokenCache};

use crate::meta::Api;
use crate::model::HeadersConfig;

#[derive(Debug, thiserror::Error)]
pub enum OAuthBridgeError {
    #[error(transparent)]
    Resolve(#[from] OAuthConfigError),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Selected auth directives for (api, is_stream); `None` when neither the
/// match nor the defaults declare `auth_oauth_bearer`/`oauth`.
pub fn resolve_oauth_config(headers: &HeadersConfig, api: Api, is_stream: bool) -> Option<&OAuthConfig> {
    let directives = headers.auth.select(api, is_stream).map(|m| &m.payload).unwrap_or(&headers.auth.defaults);
    if !directives.auth_oauth_bearer {
        return None;
    }
    directives.oauth.as_ref()
}

/// Resolves and fetches a cached (or freshly exchanged) token for this
/// request's provider/auth configuration. Returns `Ok(None)` when the
/// provider doesn't declare OAuth for this (api, is_stream) pair -- not an
/// error, just "static key auth, nothing to inject".
pub async fn token_for_request(cache: &TokenCache, headers: &HeadersConfig, api: Api, is_stream: bool) -> Result<Option<CachedToken>, OAuthBridgeError> {
    let Some(config) = resolve_oauth_config(headers, api, is_stream) else {
        return Ok(None);
    };
    let resolved = config.resolve()?;
    let token = cache.get(&resolved).await?;
    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthDirectives, Match, Phase};

    #[test]
    fn no_oauth_declared_returns_none() {
        let headers = HeadersConfig::default();
        assert!(resolve_oauth_config(&headers, Api::ChatCompletions, false).is_none());
    }

    #[test]
    fn match_overrides_defaults_oauth_flag() {
        let headers = HeadersConfig {
            auth: Phase {
                defaults: AuthDirectives::default(),
                matches: vec![Match {
                    api: Api::ChatCompletions,
                    stream: None,
                    payload: AuthDirectives {
                        auth_oauth_bearer: true,
                        oauth: Some(OAuthConfig { mode: Some(onr_oauth::OAuthMode::OpenAI), refresh_token: Some("rt".into()), ..Default::default() }),
                        ..Default::default()
                    },
                }],
            },
            header_ops: Phase::default(),
        };
        assert!(resolve_oauth_config(&headers, Api::ChatCompletions, false).is_some());
        assert!(resolve_oauth_config(&headers, Api::Embeddings, false).is_none());
    }
}
