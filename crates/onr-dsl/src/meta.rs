//! `Meta`: the per-request mutable context the engine reads and writes as it
//! walks a provider's phases. Owned exclusively by the request task -- never
//! wrapped in `Arc`, never shared across tasks.

use std::fmt;
use std::time::Instant;

/// The closed set of logical endpoint families a client request can select.
/// `FromStr`/`Display` use the exact wire strings so routing comparisons
/// never drift from the serialized form used in provider files and request
/// paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    Completions,
    ChatCompletions,
    Responses,
    ClaudeMessages,
    Embeddings,
    ImagesGenerations,
    AudioSpeech,
    AudioTranscriptions,
    AudioTranslations,
    GeminiGenerateContent,
    GeminiStreamGenerateContent,
}

impl Api {
    pub fn as_str(&self) -> &'static str {
        match self {
            Api::Completions => "completions",
            Api::ChatCompletions => "chat.completions",
            Api::Responses => "responses",
            Api::ClaudeMessages => "claude.messages",
            Api::Embeddings => "embeddings",
            Api::ImagesGenerations => "images.generations",
            Api::AudioSpeech => "audio.speech",
            Api::AudioTranscriptions => "audio.transcriptions",
            Api::AudioTranslations => "audio.translations",
            Api::GeminiGenerateContent => "gemini.generateContent",
            Api::GeminiStreamGenerateContent => "gemini.streamGenerateContent",
        }
    }

    pub fn parse(s: &str) -> Option<Api> {
        Some(match s {
            "completions" => Api::Completions,
            "chat.completions" => Api::ChatCompletions,
            "responses" => Api::Responses,
            "claude.messages" => Api::ClaudeMessages,
            "embeddings" => Api::Embeddings,
            "images.generations" => Api::ImagesGenerations,
            "audio.speech" => Api::AudioSpeech,
            "audio.transcriptions" => Api::AudioTranscriptions,
            "audio.translations" => Api::AudioTranslations,
            "gemini.generateContent" => Api::GeminiGenerateContent,
            "gemini.streamGenerateContent" => Api::GeminiStreamGenerateContent,
            _ => return None,
        })
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Api {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Api::parse(s).ok_or_else(|| format!("unknown api: {s}"))
    }
}

/// The request-scoped mutable context. Secret bytes (`api_key`) are never
/// exposed through the derived `Debug` impl below -- a manual impl redacts
/// them so they never end up in a log line by accident.
pub struct Meta {
    pub api: Api,
    pub is_stream: bool,
    pub base_url: String,
    pub api_key: Vec<u8>,
    pub actual_model_name: String,
    pub mapped_model_name: String,
    pub request_url_path: String,
    pub start_time: Instant,
    /// Access token injected by the OAuth phase, if the provider declared one.
    pub oauth_access_token: Option<String>,
    pub oauth_token_type: Option<String>,
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("api", &self.api)
            .field("is_stream", &self.is_stream)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("actual_model_name", &self.actual_model_name)
            .field("mapped_model_name", &self.mapped_model_name)
            .field("request_url_path", &self.request_url_path)
            .finish()
    }
}

impl Meta {
    /// `mapped_model_name` defaults to `actual_model_name` until a
    /// `model_map` directive overrides it.
    pub fn new(api: Api, is_stream: bool, actual_model_name: impl Into<String>, request_url_path: impl Into<String>) -> Self {
        let actual_model_name = actual_model_name.into();
        Meta {
            api,
            is_stream,
            base_url: String::new(),
            api_key: Vec::new(),
            mapped_model_name: actual_model_name.clone(),
            actual_model_name,
            request_url_path: request_url_path.into(),
            start_time: Instant::now(),
            oauth_access_token: None,
            oauth_token_type: None,
        }
    }

    pub fn channel_key(&self) -> String {
        String::from_utf8_lossy(&self.api_key).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_model_defaults_to_actual() {
        let meta = Meta::new(Api::ChatCompletions, false, "gpt-4o", "/v1/chat/completions");
        assert_eq!(meta.mapped_model_name, "gpt-4o");
    }

    #[test]
    fn api_wire_strings_roundtrip() {
        for api in [
            Api::Completions,
            Api::ChatCompletions,
            Api::Responses,
            Api::ClaudeMessages,
            Api::Embeddings,
            Api::ImagesGenerations,
            Api::AudioSpeech,
            Api::AudioTranscriptions,
            Api::AudioTranslations,
            Api::GeminiGenerateContent,
            Api::GeminiStreamGenerateContent,
        ] {
            assert_eq!(Api::parse(api.as_str()), Some(api));
        }
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut meta = Meta::new(Api::ChatCompletions, false, "gpt-4o", "/v1/chat/completions");
        meta.api_key = b"sk-super-secret".to_vec();
        let dbg = format!("{meta:?}");
        assert!(!dbg.contains("sk-super-secret"));
    }
}
