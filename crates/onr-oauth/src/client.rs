//! Performs the actual token-endpoint HTTP exchange described by a
//! [`ResolvedOAuth`], using the same `wreq` client the rest of this
//! workspace uses for outbound calls.

use std::time::{Duration, Instant};

use onr_expr::path::{ReadPath, PathError};
use serde_json::Value;

use crate::cache::CachedToken;
use crate::config::{ContentType, HttpMethod, ResolvedOAuth};

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("oauth token request failed: {0}")]
    Transport(String),
    #[error("oauth token endpoint returned {status}: {body}")]
    NonSuccess { status: u16, body: String },
    #[error("oauth token response was not valid json: {0}")]
    InvalidJson(String),
    #[error("oauth token extraction path error: {0}")]
    Path(#[from] PathError),
    #[error("oauth token response had no value at the configured token path")]
    MissingToken,
    #[error("{0}")]
    Other(String),
}

const MAX_ERROR_BODY_LEN: usize = 2048;

pub async fn exchange(oauth: &ResolvedOAuth) -> Result<CachedToken, ExchangeError> {
    let client = wreq::Client::new();

    let mut builder = match oauth.method {
        HttpMethod::Post => client.post(&oauth.token_url),
        HttpMethod::Get => client.get(&oauth.token_url),
    };
    builder = builder.timeout(oauth.timeout);

    if let Some((id, secret)) = &oauth.basic_auth {
        builder = builder.basic_auth(id, Some(secret));
    }

    builder = match (oauth.method, oauth.content_type) {
        (HttpMethod::Get, _) => builder.query(&oauth.form),
        (HttpMethod::Post, ContentType::Form) => builder.form(&oauth.form),
        (HttpMethod::Post, ContentType::Json) => {
            let body: serde_json::Map<String, Value> = oauth
                .form
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            builder.json(&Value::Object(body))
        }
    };

    let resp = builder
        .send()
        .await
        .map_err(|e| ExchangeError::Transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let truncated: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
        return Err(ExchangeError::NonSuccess { status: status.as_u16(), body: truncated });
    }

    let body: Value = resp
        .json()
        .await
        .map_err(|e| ExchangeError::InvalidJson(e.to_string()))?;

    extract_token(oauth, &body)
}

fn extract_token(oauth: &ResolvedOAuth, body: &Value) -> Result<CachedToken, ExchangeError> {
    let token_path = ReadPath::parse(&oauth.token_path)?;
    let access_token = onr_expr::path::eval_read(body, &token_path)
        .into_iter()
        .find_map(|v| v.as_str())
        .ok_or(ExchangeError::MissingToken)?
        .to_string();

    let token_type = ReadPath::parse(&oauth.token_type_path)
        .ok()
        .map(|p| onr_expr::path::eval_read(body, &p))
        .and_then(|matches| matches.into_iter().find_map(|v| v.as_str()))
        .unwrap_or("Bearer")
        .to_string();

    let expires_in = ReadPath::parse(&oauth.expires_in_path)
        .ok()
        .map(|p| onr_expr::path::eval_read(body, &p))
        .and_then(|matches| matches.into_iter().find_map(|v| v.as_f64()))
        .map(|secs| Duration::from_secs_f64(secs.max(0.0)))
        .unwrap_or(oauth.fallback_ttl);

    Ok(CachedToken {
        access_token,
        token_type,
        expires_at: Instant::now() + expires_in,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_oauth() -> ResolvedOAuth {
        crate::config::OAuthConfig {
            mode: Some(crate::config::OAuthMode::OpenAI),
            refresh_token: Some("rt".into()),
            ..Default::default()
        }
        .resolve()
        .unwrap()
    }

    #[test]
    fn extracts_access_token_and_default_fields() {
        let oauth = sample_oauth();
        let body = json!({"access_token": "abc123", "expires_in": 120});
        let token = extract_token(&oauth, &body).unwrap();
        assert_eq!(token.access_token, "abc123");
        assert_eq!(token.token_type, "Bearer");
    }

    #[test]
    fn missing_token_is_an_error() {
        let oauth = sample_oauth();
        let body = json!({"expires_in": 120});
        assert!(matches!(extract_token(&oauth, &body), Err(ExchangeError::MissingToken)));
    }

    #[test]
    fn falls_back_to_configured_ttl_when_expires_in_absent() {
        let oauth = sample_oauth();
        let body = json!({"access_token": "abc123"});
        let token = extract_token(&oauth, &body).unwrap();
        assert!(token.expires_at > Instant::now() + Duration::from_secs(3000));
    }
}
