//! Typed, validated provider configuration. Built once by [`crate::build`]
//! from a [`onr_dsl_parser::RawDocument`] and shared by reference
//! (`Arc<ProviderFile>`) -- immutable after construction, no interior
//! mutability anywhere in this module.

use onr_expr::{Expr, ReadPath, UsageExpr, WritePath};
use onr_oauth::OAuthConfig;

use crate::meta::Api;

/// `Defaults` plus an ordered list of `Matches`, generic over the per-phase
/// payload type. Selection (per §3): first match whose `api` equals
/// `meta.api` AND whose `stream` is unset or matches `meta.is_stream` wins;
/// otherwise the defaults alone apply.
#[derive(Debug, Clone, Default)]
pub struct Phase<T> {
    pub defaults: T,
    pub matches: Vec<Match<T>>,
}

#[derive(Debug, Clone)]
pub struct Match<T> {
    pub api: Api,
    pub stream: Option<bool>,
    pub payload: T,
}

impl<T> Phase<T> {
    pub fn select(&self, api: Api, is_stream: bool) -> Option<&Match<T>> {
        self.matches
            .iter()
            .find(|m| m.api == api && m.stream.is_none_or(|s| s == is_stream))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    pub base_url_expr: Option<Expr>,
    pub matches: Vec<Match<RoutingDirectives>>,
}

#[derive(Debug, Clone, Default)]
pub struct RoutingDirectives {
    pub set_path: Option<Expr>,
    pub del_query: Vec<Expr>,
    /// `(key_expr, value_expr)`, applied in declaration order; a later
    /// `set_query` on the same evaluated key overrides an earlier one.
    pub set_query: Vec<(Expr, Expr)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderOpKind {
    Set,
    Del,
}

#[derive(Debug, Clone)]
pub struct HeaderOp {
    pub kind: HeaderOpKind,
    pub name: Expr,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthDirectives {
    /// Synthesizes `set_header Authorization "Bearer " + $channel.key`.
    pub auth_bearer: bool,
    /// Synthesizes `set_header <name> $channel.key`.
    pub auth_header_key: Option<String>,
    /// OAuth-based bearer injection: resolved token overrides any static key.
    pub auth_oauth_bearer: bool,
    pub oauth: Option<OAuthConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct HeadersConfig {
    pub auth: Phase<AuthDirectives>,
    pub header_ops: Phase<Vec<HeaderOp>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonOpKind {
    Set,
    SetIfAbsent,
    Del,
    Rename,
}

#[derive(Debug, Clone)]
pub struct JsonOp {
    pub kind: JsonOpKind,
    pub path: WritePath,
    /// Present for `set`/`set_if_absent`; the rename target for `rename`
    /// (reusing this field keeps the enum flat -- see `build.rs`).
    pub value: Option<Expr>,
    pub rename_to: Option<WritePath>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqMapMode {
    OpenaiChatToOpenaiResponses,
    AnthropicToOpenaiChat,
    GeminiToOpenaiChat,
    OpenaiChatToAnthropicMessages,
    OpenaiChatToGeminiGenerateContent,
}

#[derive(Debug, Clone, Default)]
pub struct ModelMap {
    pub map: Vec<(String, String)>,
    pub default: Option<String>,
}

impl ModelMap {
    /// `match` overrides keys present in `defaults`; later entries in either
    /// list win on exact duplicate keys.
    pub fn merged(defaults: &ModelMap, over: &ModelMap) -> ModelMap {
        let mut map = defaults.map.clone();
        for (k, v) in &over.map {
            if let Some(existing) = map.iter_mut().find(|(ek, _)| ek == k) {
                existing.1 = v.clone();
            } else {
                map.push((k.clone(), v.clone()));
            }
        }
        ModelMap { map, default: over.default.clone().or_else(|| defaults.default.clone()) }
    }

    pub fn apply(&self, actual_model_name: &str) -> String {
        self.map
            .iter()
            .find(|(k, _)| k == actual_model_name)
            .map(|(_, v)| v.clone())
            .or_else(|| self.default.clone())
            .unwrap_or_else(|| actual_model_name.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestTransformDirectives {
    pub model_map: ModelMap,
    pub req_map: Option<ReqMapMode>,
    pub json_ops: Vec<JsonOp>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestTransformConfig {
    pub phase: Phase<RequestTransformDirectives>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespMapMode {
    OpenaiResponsesToOpenaiChat,
    AnthropicToOpenaiChat,
    GeminiToOpenaiChat,
    OpenaiChatToAnthropicMessages,
    OpenaiChatToGeminiGenerateContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseParseMode {
    OpenaiResponsesToOpenaiChatChunks,
    AnthropicToOpenaiChatChunks,
    GeminiToOpenaiChatChunks,
    OpenaiChatToAnthropicChunks,
    OpenaiChatToGeminiChunks,
}

/// Last directive among `{resp_passthrough, resp_map, sse_parse}` in
/// declaration order wins (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Passthrough,
    RespMap(RespMapMode),
    SseParse(SseParseMode),
}

#[derive(Debug, Clone)]
pub struct SseJsonDelIf {
    pub cond_path: ReadPath,
    pub equals: String,
    pub del_path: WritePath,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseDirectives {
    pub mode: ResponseMode,
    pub sse_del_ifs: Vec<SseJsonDelIf>,
    pub json_ops: Vec<JsonOp>,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseConfig {
    pub phase: Phase<ResponseDirectives>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMapMode {
    Openai,
    Common,
    Passthrough,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorDirectives {
    pub mode: Option<ErrorMapMode>,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorConfig {
    pub phase: Phase<ErrorDirectives>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageExtractMode {
    Openai,
    Anthropic,
    Gemini,
    Custom,
}

#[derive(Debug, Clone, Default)]
pub struct UsageDirectives {
    pub mode: Option<UsageExtractMode>,
    pub input_tokens: Option<UsageExpr>,
    pub output_tokens: Option<UsageExpr>,
    pub total_tokens: Option<UsageExpr>,
    pub cached_tokens: Option<UsageExpr>,
    pub cache_write_tokens: Option<UsageExpr>,
    /// Fallback single-path lookups used when a `custom` mode doesn't
    /// define the arithmetic form for a field (§4.9).
    pub input_tokens_path: Option<ReadPath>,
    pub output_tokens_path: Option<ReadPath>,
}

#[derive(Debug, Clone, Default)]
pub struct UsageConfig {
    pub phase: Phase<UsageDirectives>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReasonMode {
    Openai,
    Anthropic,
    Gemini,
    Custom,
}

#[derive(Debug, Clone, Default)]
pub struct FinishReasonDirectives {
    pub mode: Option<FinishReasonMode>,
    pub path: Option<ReadPath>,
}

#[derive(Debug, Clone, Default)]
pub struct FinishReasonConfig {
    pub phase: Phase<FinishReasonDirectives>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceMode {
    Openai,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceUnit {
    Usd,
    Cny,
}

#[derive(Debug, Clone)]
pub struct BalanceConfig {
    pub mode: BalanceMode,
    pub path: Option<Expr>,
    pub balance_path: Option<ReadPath>,
    pub used_path: Option<ReadPath>,
    pub unit: BalanceUnit,
    pub auth: Option<HeaderOp>,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        BalanceConfig {
            mode: BalanceMode::Openai,
            path: None,
            balance_path: None,
            used_path: None,
            unit: BalanceUnit::Usd,
            auth: None,
        }
    }
}

/// Immutable after construction (§9 "Ownership"); shared by reference.
#[derive(Debug, Clone, Default)]
pub struct ProviderFile {
    pub name: String,
    pub routing: RoutingConfig,
    pub headers: HeadersConfig,
    pub request: RequestTransformConfig,
    pub response: ResponseConfig,
    pub error: ErrorConfig,
    pub usage: UsageConfig,
    pub finish_reason: FinishReasonConfig,
    pub balance: Option<BalanceConfig>,
}
