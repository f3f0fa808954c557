//! `OAuthConfig`: the closed set of modes, each with a built-in default
//! template, and the overrides a provider file may supply.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthMode {
    OpenAI,
    Gemini,
    Qwen,
    Claude,
    Iflow,
    Antigravity,
    Kimi,
    Custom,
}

impl OAuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthMode::OpenAI => "openai",
            OAuthMode::Gemini => "gemini",
            OAuthMode::Qwen => "qwen",
            OAuthMode::Claude => "claude",
            OAuthMode::Iflow => "iflow",
            OAuthMode::Antigravity => "antigravity",
            OAuthMode::Kimi => "kimi",
            OAuthMode::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<OAuthMode> {
        Some(match s {
            "openai" => OAuthMode::OpenAI,
            "gemini" => OAuthMode::Gemini,
            "qwen" => OAuthMode::Qwen,
            "claude" => OAuthMode::Claude,
            "iflow" => OAuthMode::Iflow,
            "antigravity" => OAuthMode::Antigravity,
            "kimi" => OAuthMode::Kimi,
            "custom" => OAuthMode::Custom,
            _ => return None,
        })
    }

    /// Modes whose token exchange authenticates the client itself via HTTP
    /// Basic auth (`client_id:client_secret`) rather than a form field.
    pub fn uses_basic_auth(&self) -> bool {
        matches!(self, OAuthMode::Iflow | OAuthMode::Antigravity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Form,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub mode: Option<OAuthMode>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub audience: Option<String>,
    pub method: Option<HttpMethod>,
    pub content_type: Option<ContentType>,
    pub form_fields: Vec<(String, String)>,
    pub token_path: Option<String>,
    pub expires_in_path: Option<String>,
    pub token_type_path: Option<String>,
    pub timeout_secs: Option<u64>,
    pub refresh_skew_secs: Option<u64>,
    pub fallback_ttl_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OAuthConfigError {
    #[error("oauth mode is required")]
    MissingMode,
    #[error("custom oauth mode requires an explicit token_url")]
    CustomMissingTokenUrl,
    #[error("custom oauth mode requires at least one form field")]
    CustomMissingFormField,
}

/// Concrete, fully-resolved exchange parameters: mode defaults merged with
/// any overrides the provider file supplied.
#[derive(Debug, Clone)]
pub struct ResolvedOAuth {
    pub mode: OAuthMode,
    pub token_url: String,
    pub method: HttpMethod,
    pub content_type: ContentType,
    pub basic_auth: Option<(String, String)>,
    pub form: Vec<(String, String)>,
    pub token_path: String,
    pub expires_in_path: String,
    pub token_type_path: String,
    pub timeout: Duration,
    pub refresh_skew: Duration,
    pub fallback_ttl: Duration,
}

struct ModeDefaults {
    token_url: Option<&'static str>,
    form_fields: &'static [(&'static str, &'static str)],
}

/// Every `token_url` below is the real token endpoint this engine's host
/// project already talks to for that provider; `qwen`/`iflow`/`kimi` have no
/// such precedent in this codebase, so they ship with no default and must
/// be configured explicitly, same as `custom`.
fn mode_defaults(mode: OAuthMode) -> ModeDefaults {
    match mode {
        OAuthMode::OpenAI => ModeDefaults {
            token_url: Some("https://auth.openai.com/oauth/token"),
            form_fields: &[("grant_type", "refresh_token")],
        },
        OAuthMode::Gemini => ModeDefaults {
            token_url: Some("https://oauth2.googleapis.com/token"),
            form_fields: &[("grant_type", "refresh_token")],
        },
        OAuthMode::Claude => ModeDefaults {
            token_url: Some("https://console.anthropic.com/v1/oauth/token"),
            form_fields: &[("grant_type", "refresh_token")],
        },
        OAuthMode::Antigravity => ModeDefaults {
            token_url: Some("https://oauth2.googleapis.com/token"),
            form_fields: &[("grant_type", "refresh_token")],
        },
        OAuthMode::Qwen | OAuthMode::Iflow | OAuthMode::Kimi | OAuthMode::Custom => {
            ModeDefaults { token_url: None, form_fields: &[] }
        }
    }
}

impl OAuthConfig {
    pub fn resolve(&self) -> Result<ResolvedOAuth, OAuthConfigError> {
        let mode = self.mode.ok_or(OAuthConfigError::MissingMode)?;
        let defaults = mode_defaults(mode);

        let token_url = self
            .token_url
            .clone()
            .or_else(|| defaults.token_url.map(str::to_string));
        let token_url = match (mode, token_url) {
            (OAuthMode::Custom, None) => return Err(OAuthConfigError::CustomMissingTokenUrl),
            (_, Some(url)) => url,
            (_, None) => return Err(OAuthConfigError::CustomMissingTokenUrl),
        };

        let mut form: Vec<(String, String)> = defaults
            .form_fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(refresh_token) = &self.refresh_token {
            form.push(("refresh_token".to_string(), refresh_token.clone()));
        }
        if !mode.uses_basic_auth() {
            if let Some(client_id) = &self.client_id {
                form.push(("client_id".to_string(), client_id.clone()));
            }
            if let Some(client_secret) = &self.client_secret {
                form.push(("client_secret".to_string(), client_secret.clone()));
            }
        }
        if let Some(scope) = &self.scope {
            form.push(("scope".to_string(), scope.clone()));
        }
        if let Some(audience) = &self.audience {
            form.push(("audience".to_string(), audience.clone()));
        }
        form.extend(self.form_fields.iter().cloned());

        if mode == OAuthMode::Custom && form.is_empty() {
            return Err(OAuthConfigError::CustomMissingFormField);
        }

        // Stable ordering for cache-identity purposes; the wire request is
        // unaffected by key order.
        let mut sorted_form = form.clone();
        sorted_form.sort();

        let basic_auth = if mode.uses_basic_auth() {
            match (&self.client_id, &self.client_secret) {
                (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
                _ => None,
            }
        } else {
            None
        };

        Ok(ResolvedOAuth {
            mode,
            token_url,
            method: self.method.unwrap_or(HttpMethod::Post),
            content_type: self.content_type.unwrap_or(ContentType::Form),
            basic_auth,
            form: sorted_form,
            token_path: self.token_path.clone().unwrap_or_else(|| "$.access_token".to_string()),
            expires_in_path: self.expires_in_path.clone().unwrap_or_else(|| "$.expires_in".to_string()),
            token_type_path: self.token_type_path.clone().unwrap_or_else(|| "$.token_type".to_string()),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(5)),
            refresh_skew: Duration::from_secs(self.refresh_skew_secs.unwrap_or(60)),
            fallback_ttl: Duration::from_secs(self.fallback_ttl_secs.unwrap_or(3600)),
        })
    }
}

impl ResolvedOAuth {
    /// A deterministic string derived from every input that affects the
    /// exchange outcome; hashed by the caller to form a cache key / filename.
    pub fn cache_identity(&self) -> String {
        let form_str = self
            .form
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let basic = self
            .basic_auth
            .as_ref()
            .map(|(id, secret)| format!("{id}:{secret}"))
            .unwrap_or_default();
        format!(
            "{}|{}|{:?}|{:?}|{}|{}|{}|{}|{}|{}|{}",
            self.mode.as_str(),
            self.token_url,
            self.method,
            self.content_type,
            basic,
            form_str,
            self.token_path,
            self.expires_in_path,
            self.token_type_path,
            self.timeout.as_millis(),
            self.refresh_skew.as_millis(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_mode_uses_builtin_token_url() {
        let cfg = OAuthConfig { mode: Some(OAuthMode::OpenAI), refresh_token: Some("rt".into()), ..Default::default() };
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.token_url, "https://auth.openai.com/oauth/token");
        assert!(resolved.form.iter().any(|(k, v)| k == "refresh_token" && v == "rt"));
    }

    #[test]
    fn custom_requires_token_url_and_field() {
        let cfg = OAuthConfig { mode: Some(OAuthMode::Custom), ..Default::default() };
        assert_eq!(cfg.resolve().unwrap_err(), OAuthConfigError::CustomMissingTokenUrl);

        let cfg = OAuthConfig {
            mode: Some(OAuthMode::Custom),
            token_url: Some("https://example.test/token".into()),
            ..Default::default()
        };
        assert_eq!(cfg.resolve().unwrap_err(), OAuthConfigError::CustomMissingFormField);
    }

    #[test]
    fn cache_identity_includes_extraction_paths() {
        let mut cfg = OAuthConfig { mode: Some(OAuthMode::OpenAI), refresh_token: Some("rt".into()), ..Default::default() };
        let a = cfg.resolve().unwrap().cache_identity();
        cfg.token_path = Some("$.custom_token".into());
        let b = cfg.resolve().unwrap().cache_identity();
        assert_ne!(a, b);
    }
}
