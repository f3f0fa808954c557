//! Semantic builder (§3, §9 "Validation"): walks a [`RawProvider`] parse
//! tree into a validated [`ProviderFile`], the typed form every other module
//! in this crate operates on. This is the only place in the crate that knows
//! directive names -- everything downstream works against `model.rs` types.

use onr_dsl_parser::{RawBlock, RawMatchBlock, RawProvider, RawStatement, Token};
use onr_dsl_parser::expr_builder;
use onr_expr::{Expr, ReadPath, UsageExpr, WritePath};
use onr_oauth::{ContentType, HttpMethod, OAuthConfig, OAuthMode};

use crate::meta::Api;
use crate::model::*;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("provider name {0:?} is not a valid identifier (expected ^[a-z][a-z0-9_-]*$)")]
    InvalidName(String),
    #[error("provider name {name:?} does not match its file name {expected:?}")]
    NameMismatch { name: String, expected: String },
    #[error("{line}:{col}: {message}")]
    Directive { line: u32, col: u32, message: String },
}

fn directive_err(stmt: &RawStatement, message: impl Into<String>) -> BuildError {
    BuildError::Directive { line: stmt.line, col: stmt.col, message: message.into() }
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn phase<'a>(block: &'a RawBlock, name: &str) -> &'a [RawStatement] {
    block.phases.get(name).map(Vec::as_slice).unwrap_or(&[])
}

fn one_string(stmt: &RawStatement) -> Result<&str, BuildError> {
    match stmt.arg_strings().as_slice() {
        [s] => Ok(*s),
        _ => Err(directive_err(stmt, format!("{} takes exactly one argument", stmt.name))),
    }
}

fn one_expr(stmt: &RawStatement) -> Result<Expr, BuildError> {
    expr_builder::build_expr_exact(&stmt.args).map_err(|e| directive_err(stmt, format!("{}: {e}", stmt.name)))
}

fn two_exprs(stmt: &RawStatement) -> Result<(Expr, Expr), BuildError> {
    let mut pos = 0;
    let first = expr_builder::build_expr(&stmt.args, &mut pos).map_err(|e| directive_err(stmt, format!("{}: {e}", stmt.name)))?;
    let second = expr_builder::build_expr(&stmt.args, &mut pos).map_err(|e| directive_err(stmt, format!("{}: {e}", stmt.name)))?;
    if pos != stmt.args.len() {
        return Err(directive_err(stmt, format!("{} takes exactly two arguments", stmt.name)));
    }
    Ok((first, second))
}

fn read_path(stmt: &RawStatement, s: &str) -> Result<ReadPath, BuildError> {
    ReadPath::parse(s).map_err(|e| directive_err(stmt, format!("{}: {e}", stmt.name)))
}

fn write_path(stmt: &RawStatement, s: &str) -> Result<WritePath, BuildError> {
    WritePath::parse(s).map_err(|e| directive_err(stmt, format!("{}: {e}", stmt.name)))
}

fn usage_expr(stmt: &RawStatement, s: &str) -> Result<UsageExpr, BuildError> {
    UsageExpr::parse(s).map_err(|e| directive_err(stmt, format!("{}: {e}", stmt.name)))
}

// ---------------------------------------------------------------- routing --

/// §4.2: "`upstream_config.base_url` is a non-empty absolute URL literal" --
/// fatal for the file, not a runtime surprise. Rejects anything that isn't a
/// quoted `scheme://host` literal.
fn validate_base_url_literal(stmt: &RawStatement, expr: &Expr) -> Result<(), BuildError> {
    let Expr::Literal(s) = expr else {
        return Err(directive_err(stmt, "base_url must be a quoted absolute URL literal"));
    };
    let Some((scheme, rest)) = s.split_once("://") else {
        return Err(directive_err(stmt, format!("base_url {s:?} must be an absolute URL (scheme://host)")));
    };
    let scheme_ok = !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if !scheme_ok || host.is_empty() {
        return Err(directive_err(stmt, format!("base_url {s:?} must be an absolute URL (scheme://host)")));
    }
    Ok(())
}

fn build_routing_defaults(block: &RawBlock) -> Result<Option<Expr>, BuildError> {
    let mut base_url = None;
    for stmt in phase(block, "upstream_config") {
        match stmt.name.as_str() {
            "base_url" => {
                let expr = one_expr(stmt)?;
                validate_base_url_literal(stmt, &expr)?;
                base_url = Some(expr);
            }
            other => return Err(directive_err(stmt, format!("unknown upstream_config directive `{other}`"))),
        }
    }
    Ok(base_url)
}

fn build_routing_match(block: &RawBlock) -> Result<RoutingDirectives, BuildError> {
    let mut directives = RoutingDirectives::default();
    for stmt in phase(block, "upstream") {
        match stmt.name.as_str() {
            "set_path" => directives.set_path = Some(one_expr(stmt)?),
            "del_query" => directives.del_query.push(one_expr(stmt)?),
            "set_query" => {
                let (key, value) = two_exprs(stmt)?;
                directives.set_query.push((key, value));
            }
            other => return Err(directive_err(stmt, format!("unknown upstream directive `{other}`"))),
        }
    }
    Ok(directives)
}

// ------------------------------------------------------------------- auth --

fn build_auth(block: &RawBlock) -> Result<AuthDirectives, BuildError> {
    let mut directives = AuthDirectives::default();
    let mut oauth: Option<OAuthConfig> = None;
    let oauth = |oauth: &mut Option<OAuthConfig>| oauth.get_or_insert_with(OAuthConfig::default);

    for stmt in phase(block, "auth") {
        match stmt.name.as_str() {
            "auth_bearer" => directives.auth_bearer = true,
            "auth_header_key" => directives.auth_header_key = Some(one_string(stmt)?.to_string()),
            "auth_oauth_bearer" => directives.auth_oauth_bearer = true,
            "oauth_mode" => {
                let mode = OAuthMode::parse(one_string(stmt)?).ok_or_else(|| directive_err(stmt, "unknown oauth_mode"))?;
                oauth(&mut oauth).mode = Some(mode);
            }
            "oauth_token_url" => oauth(&mut oauth).token_url = Some(one_string(stmt)?.to_string()),
            "oauth_client_id" => oauth(&mut oauth).client_id = Some(one_string(stmt)?.to_string()),
            "oauth_client_secret" => oauth(&mut oauth).client_secret = Some(one_string(stmt)?.to_string()),
            "oauth_refresh_token" => oauth(&mut oauth).refresh_token = Some(one_string(stmt)?.to_string()),
            "oauth_scope" => oauth(&mut oauth).scope = Some(one_string(stmt)?.to_string()),
            "oauth_audience" => oauth(&mut oauth).audience = Some(one_string(stmt)?.to_string()),
            "oauth_method" => {
                let method = match one_string(stmt)? {
                    "get" => HttpMethod::Get,
                    "post" => HttpMethod::Post,
                    other => return Err(directive_err(stmt, format!("unknown oauth_method `{other}`"))),
                };
                oauth(&mut oauth).method = Some(method);
            }
            "oauth_content_type" => {
                let content_type = match one_string(stmt)? {
                    "form" => ContentType::Form,
                    "json" => ContentType::Json,
                    other => return Err(directive_err(stmt, format!("unknown oauth_content_type `{other}`"))),
                };
                oauth(&mut oauth).content_type = Some(content_type);
            }
            "oauth_form_field" => {
                let args = stmt.arg_strings();
                let [key, value] = args.as_slice() else {
                    return Err(directive_err(stmt, "oauth_form_field takes exactly two arguments"));
                };
                oauth(&mut oauth).form_fields.push((key.to_string(), value.to_string()));
            }
            "oauth_token_path" => oauth(&mut oauth).token_path = Some(one_string(stmt)?.to_string()),
            "oauth_expires_in_path" => oauth(&mut oauth).expires_in_path = Some(one_string(stmt)?.to_string()),
            "oauth_token_type_path" => oauth(&mut oauth).token_type_path = Some(one_string(stmt)?.to_string()),
            "oauth_timeout_secs" => {
                oauth(&mut oauth).timeout_secs = Some(parse_u64(stmt, one_string(stmt)?)?);
            }
            "oauth_refresh_skew_secs" => {
                oauth(&mut oauth).refresh_skew_secs = Some(parse_u64(stmt, one_string(stmt)?)?);
            }
            "oauth_fallback_ttl_secs" => {
                oauth(&mut oauth).fallback_ttl_secs = Some(parse_u64(stmt, one_string(stmt)?)?);
            }
            other => return Err(directive_err(stmt, format!("unknown auth directive `{other}`"))),
        }
    }
    // §4.2: OAuth mode must be in the closed set (enforced above by
    // `OAuthMode::parse`) and `custom` requires an explicit token URL and at
    // least one form field -- fatal for the file at build time, not a
    // surprise on first use.
    if let Some(cfg) = &oauth {
        if let Err(e) = cfg.resolve() {
            return Err(BuildError::Directive { line: 0, col: 0, message: format!("oauth: {e}") });
        }
    }
    directives.oauth = oauth;
    Ok(directives)
}

fn parse_u64(stmt: &RawStatement, s: &str) -> Result<u64, BuildError> {
    s.parse().map_err(|_| directive_err(stmt, format!("{}: expected an integer, found {s:?}", stmt.name)))
}

// ---------------------------------------------------------------- headers --

fn build_header_ops(block: &RawBlock) -> Result<Vec<HeaderOp>, BuildError> {
    let mut ops = Vec::new();
    for stmt in phase(block, "request") {
        match stmt.name.as_str() {
            "set_header" => {
                let (name, value) = two_exprs(stmt)?;
                ops.push(HeaderOp { kind: HeaderOpKind::Set, name, value: Some(value) });
            }
            "del_header" => ops.push(HeaderOp { kind: HeaderOpKind::Del, name: one_expr(stmt)?, value: None }),
            _ => {}
        }
    }
    Ok(ops)
}

// ---------------------------------------------------------- request body --

fn build_json_op(stmt: &RawStatement) -> Result<Option<JsonOp>, BuildError> {
    match stmt.name.as_str() {
        "json_set" | "json_set_if_absent" => {
            let args = &stmt.args;
            let Some((path_tok, value_toks)) = args.split_first() else {
                return Err(directive_err(stmt, format!("{} requires a path and a value", stmt.name)));
            };
            let path = write_path(stmt, &path_tok.text)?;
            let mut pos = 0;
            let value = expr_builder::build_expr(value_toks, &mut pos).map_err(|e| directive_err(stmt, format!("{}: {e}", stmt.name)))?;
            if pos != value_toks.len() {
                return Err(directive_err(stmt, format!("{} takes exactly a path and a value", stmt.name)));
            }
            let kind = if stmt.name == "json_set" { JsonOpKind::Set } else { JsonOpKind::SetIfAbsent };
            Ok(Some(JsonOp { kind, path, value: Some(value), rename_to: None }))
        }
        "json_del" => {
            let path = write_path(stmt, one_string(stmt)?)?;
            Ok(Some(JsonOp { kind: JsonOpKind::Del, path, value: None, rename_to: None }))
        }
        "json_rename" => {
            let args = stmt.arg_strings();
            let [from, to] = args.as_slice() else {
                return Err(directive_err(stmt, "json_rename takes exactly two path arguments"));
            };
            let path = write_path(stmt, from)?;
            let rename_to = write_path(stmt, to)?;
            Ok(Some(JsonOp { kind: JsonOpKind::Rename, path, value: None, rename_to: Some(rename_to) }))
        }
        _ => Ok(None),
    }
}

fn parse_req_map_mode(stmt: &RawStatement, s: &str) -> Result<ReqMapMode, BuildError> {
    Ok(match s {
        "openai_chat_to_openai_responses" => ReqMapMode::OpenaiChatToOpenaiResponses,
        "anthropic_to_openai_chat" => ReqMapMode::AnthropicToOpenaiChat,
        "gemini_to_openai_chat" => ReqMapMode::GeminiToOpenaiChat,
        "openai_chat_to_anthropic_messages" => ReqMapMode::OpenaiChatToAnthropicMessages,
        "openai_chat_to_gemini_generate_content" => ReqMapMode::OpenaiChatToGeminiGenerateContent,
        other => return Err(directive_err(stmt, format!("unknown req_map mode `{other}`"))),
    })
}

fn build_request_directives(block: &RawBlock) -> Result<RequestTransformDirectives, BuildError> {
    let mut directives = RequestTransformDirectives::default();
    for stmt in phase(block, "request") {
        match stmt.name.as_str() {
            "set_header" | "del_header" => {}
            "model_map" => {
                let args = stmt.arg_strings();
                let [from, to] = args.as_slice() else {
                    return Err(directive_err(stmt, "model_map takes exactly two arguments"));
                };
                directives.model_map.map.push((from.to_string(), to.to_string()));
            }
            "model_map_default" => directives.model_map.default = Some(one_string(stmt)?.to_string()),
            "req_map" => directives.req_map = Some(parse_req_map_mode(stmt, one_string(stmt)?)?),
            "json_set" | "json_set_if_absent" | "json_del" | "json_rename" => {
                if let Some(op) = build_json_op(stmt)? {
                    directives.json_ops.push(op);
                }
            }
            other => return Err(directive_err(stmt, format!("unknown request directive `{other}`"))),
        }
    }
    Ok(directives)
}

// -------------------------------------------------------------- response --

fn parse_resp_map_mode(stmt: &RawStatement, s: &str) -> Result<RespMapMode, BuildError> {
    Ok(match s {
        "openai_responses_to_openai_chat" => RespMapMode::OpenaiResponsesToOpenaiChat,
        "anthropic_to_openai_chat" => RespMapMode::AnthropicToOpenaiChat,
        "gemini_to_openai_chat" => RespMapMode::GeminiToOpenaiChat,
        "openai_chat_to_anthropic_messages" => RespMapMode::OpenaiChatToAnthropicMessages,
        "openai_chat_to_gemini_generate_content" => RespMapMode::OpenaiChatToGeminiGenerateContent,
        other => return Err(directive_err(stmt, format!("unknown resp_map mode `{other}`"))),
    })
}

fn parse_sse_parse_mode(stmt: &RawStatement, s: &str) -> Result<SseParseMode, BuildError> {
    Ok(match s {
        "openai_responses_to_openai_chat_chunks" => SseParseMode::OpenaiResponsesToOpenaiChatChunks,
        "anthropic_to_openai_chat_chunks" => SseParseMode::AnthropicToOpenaiChatChunks,
        "gemini_to_openai_chat_chunks" => SseParseMode::GeminiToOpenaiChatChunks,
        "openai_chat_to_anthropic_chunks" => SseParseMode::OpenaiChatToAnthropicChunks,
        "openai_chat_to_gemini_chunks" => SseParseMode::OpenaiChatToGeminiChunks,
        other => return Err(directive_err(stmt, format!("unknown sse_parse mode `{other}`"))),
    })
}

fn build_response_directives(block: &RawBlock) -> Result<ResponseDirectives, BuildError> {
    let mut directives = ResponseDirectives::default();
    for stmt in phase(block, "response") {
        match stmt.name.as_str() {
            "resp_passthrough" => directives.mode = ResponseMode::Passthrough,
            "resp_map" => directives.mode = ResponseMode::RespMap(parse_resp_map_mode(stmt, one_string(stmt)?)?),
            "sse_parse" => directives.mode = ResponseMode::SseParse(parse_sse_parse_mode(stmt, one_string(stmt)?)?),
            "sse_json_del_if" => {
                let args = stmt.arg_strings();
                let [cond_path, equals, del_path] = args.as_slice() else {
                    return Err(directive_err(stmt, "sse_json_del_if takes exactly three arguments"));
                };
                if equals.is_empty() {
                    return Err(directive_err(stmt, "sse_json_del_if requires a non-empty equals value"));
                }
                directives.sse_del_ifs.push(SseJsonDelIf {
                    cond_path: read_path(stmt, cond_path)?,
                    equals: equals.to_string(),
                    del_path: write_path(stmt, del_path)?,
                });
            }
            "json_set" | "json_set_if_absent" | "json_del" | "json_rename" => {
                if let Some(op) = build_json_op(stmt)? {
                    directives.json_ops.push(op);
                }
            }
            other => return Err(directive_err(stmt, format!("unknown response directive `{other}`"))),
        }
    }
    Ok(directives)
}

// ----------------------------------------------------------------- error --

fn build_error_directives(block: &RawBlock) -> Result<ErrorDirectives, BuildError> {
    let mut directives = ErrorDirectives::default();
    for stmt in phase(block, "error") {
        match stmt.name.as_str() {
            "error_map" => {
                let mode = match one_string(stmt)? {
                    "openai" => ErrorMapMode::Openai,
                    "common" => ErrorMapMode::Common,
                    "passthrough" => ErrorMapMode::Passthrough,
                    other => return Err(directive_err(stmt, format!("unknown error_map mode `{other}`"))),
                };
                directives.mode = Some(mode);
            }
            other => return Err(directive_err(stmt, format!("unknown error directive `{other}`"))),
        }
    }
    Ok(directives)
}

// ---------------------------------------------------------------- metrics --

fn build_usage_directives(block: &RawBlock) -> Result<UsageDirectives, BuildError> {
    let mut directives = UsageDirectives::default();
    for stmt in phase(block, "metrics") {
        match stmt.name.as_str() {
            "usage_mode" => {
                let mode = match one_string(stmt)? {
                    "openai" => UsageExtractMode::Openai,
                    "anthropic" => UsageExtractMode::Anthropic,
                    "gemini" => UsageExtractMode::Gemini,
                    "custom" => UsageExtractMode::Custom,
                    other => return Err(directive_err(stmt, format!("unknown usage_mode `{other}`"))),
                };
                directives.mode = Some(mode);
            }
            "usage_input_tokens" => directives.input_tokens = Some(usage_expr(stmt, one_string(stmt)?)?),
            "usage_output_tokens" => directives.output_tokens = Some(usage_expr(stmt, one_string(stmt)?)?),
            "usage_total_tokens" => directives.total_tokens = Some(usage_expr(stmt, one_string(stmt)?)?),
            "usage_cached_tokens" => directives.cached_tokens = Some(usage_expr(stmt, one_string(stmt)?)?),
            "usage_cache_write_tokens" => directives.cache_write_tokens = Some(usage_expr(stmt, one_string(stmt)?)?),
            "usage_input_tokens_path" => directives.input_tokens_path = Some(read_path(stmt, one_string(stmt)?)?),
            "usage_output_tokens_path" => directives.output_tokens_path = Some(read_path(stmt, one_string(stmt)?)?),
            "finish_reason_mode" | "finish_reason_path" => {}
            other => return Err(directive_err(stmt, format!("unknown metrics directive `{other}`"))),
        }
    }
    if directives.mode == Some(UsageExtractMode::Custom) && (directives.input_tokens.is_none() && directives.input_tokens_path.is_none() || directives.output_tokens.is_none() && directives.output_tokens_path.is_none()) {
        return Err(BuildError::Directive {
            line: 0,
            col: 0,
            message: "custom usage_mode requires both input and output token extraction".to_string(),
        });
    }
    Ok(directives)
}

fn build_finish_reason_directives(block: &RawBlock) -> Result<FinishReasonDirectives, BuildError> {
    let mut directives = FinishReasonDirectives::default();
    for stmt in phase(block, "metrics") {
        match stmt.name.as_str() {
            "finish_reason_mode" => {
                let mode = match one_string(stmt)? {
                    "openai" => FinishReasonMode::Openai,
                    "anthropic" => FinishReasonMode::Anthropic,
                    "gemini" => FinishReasonMode::Gemini,
                    "custom" => FinishReasonMode::Custom,
                    other => return Err(directive_err(stmt, format!("unknown finish_reason_mode `{other}`"))),
                };
                directives.mode = Some(mode);
            }
            "finish_reason_path" => directives.path = Some(read_path(stmt, one_string(stmt)?)?),
            _ => {}
        }
    }
    Ok(directives)
}

// --------------------------------------------------------------- balance --

fn build_balance(block: &RawBlock) -> Result<Option<BalanceConfig>, BuildError> {
    let statements = phase(block, "balance");
    if statements.is_empty() {
        return Ok(None);
    }
    let mut config = BalanceConfig::default();
    for stmt in statements {
        match stmt.name.as_str() {
            "balance_mode" => {
                config.mode = match one_string(stmt)? {
                    "openai" => BalanceMode::Openai,
                    "custom" => BalanceMode::Custom,
                    other => return Err(directive_err(stmt, format!("unknown balance_mode `{other}`"))),
                };
            }
            "balance_url_path" => config.path = Some(one_expr(stmt)?),
            "balance_value_path" => config.balance_path = Some(read_path(stmt, one_string(stmt)?)?),
            "balance_used_path" => config.used_path = Some(read_path(stmt, one_string(stmt)?)?),
            "balance_unit" => {
                config.unit = match one_string(stmt)? {
                    "usd" => BalanceUnit::Usd,
                    "cny" => BalanceUnit::Cny,
                    other => return Err(directive_err(stmt, format!("unknown balance_unit `{other}`"))),
                };
            }
            "balance_auth_header" => {
                let (name, value) = two_exprs(stmt)?;
                config.auth = Some(HeaderOp { kind: HeaderOpKind::Set, name, value: Some(value) });
            }
            other => return Err(directive_err(stmt, format!("unknown balance directive `{other}`"))),
        }
    }
    if config.mode == BalanceMode::Custom && config.balance_path.is_none() {
        return Err(BuildError::Directive { line: 0, col: 0, message: "custom balance_mode requires balance_value_path".to_string() });
    }
    Ok(config)
}

fn build_balance_owned(block: &RawBlock) -> Result<Option<BalanceConfig>, BuildError> {
    build_balance(block).map(|c| c)
}

// ------------------------------------------------------------------ glue --

/// Builds a full [`ProviderFile`] from a [`RawProvider`], validating the
/// provider name against `expected_file_stem` (the `.conf` file's basename
/// without extension -- providers must be declared one per file, named
/// after it).
pub fn build_provider_file(raw: &RawProvider, expected_file_stem: &str) -> Result<ProviderFile, BuildError> {
    if !valid_name(&raw.name) {
        return Err(BuildError::InvalidName(raw.name.clone()));
    }
    if raw.name != expected_file_stem {
        return Err(BuildError::NameMismatch { name: raw.name.clone(), expected: expected_file_stem.to_string() });
    }

    let routing_defaults = build_routing_defaults(&raw.defaults)?;
    let auth_defaults = build_auth(&raw.defaults)?;
    let header_ops_defaults = build_header_ops(&raw.defaults)?;
    let request_defaults = build_request_directives(&raw.defaults)?;
    let response_defaults = build_response_directives(&raw.defaults)?;
    let error_defaults = build_error_directives(&raw.defaults)?;
    let usage_defaults = build_usage_directives(&raw.defaults)?;
    let finish_reason_defaults = build_finish_reason_directives(&raw.defaults)?;
    let balance = build_balance_owned(&raw.defaults)?;

    let mut routing_matches = Vec::new();
    let mut auth_matches = Vec::new();
    let mut header_ops_matches = Vec::new();
    let mut request_matches = Vec::new();
    let mut response_matches = Vec::new();
    let mut error_matches = Vec::new();
    let mut usage_matches = Vec::new();
    let mut finish_reason_matches = Vec::new();

    for m in &raw.matches {
        let api = parse_match_api(m)?;

        routing_matches.push(Match { api, stream: m.stream, payload: build_routing_match(&m.block)? });

        if !phase(&m.block, "auth").is_empty() {
            auth_matches.push(Match { api, stream: m.stream, payload: build_auth(&m.block)? });
        }
        let ops = build_header_ops(&m.block)?;
        if !ops.is_empty() {
            header_ops_matches.push(Match { api, stream: m.stream, payload: ops });
        }
        if !phase(&m.block, "request").is_empty() {
            request_matches.push(Match { api, stream: m.stream, payload: build_request_directives(&m.block)? });
        }
        if !phase(&m.block, "response").is_empty() {
            response_matches.push(Match { api, stream: m.stream, payload: build_response_directives(&m.block)? });
        }
        if !phase(&m.block, "error").is_empty() {
            error_matches.push(Match { api, stream: m.stream, payload: build_error_directives(&m.block)? });
        }
        if !phase(&m.block, "metrics").is_empty() {
            usage_matches.push(Match { api, stream: m.stream, payload: build_usage_directives(&m.block)? });
            finish_reason_matches.push(Match { api, stream: m.stream, payload: build_finish_reason_directives(&m.block)? });
        }
    }

    Ok(ProviderFile {
        name: raw.name.clone(),
        routing: RoutingConfig { base_url_expr: routing_defaults, matches: routing_matches },
        headers: HeadersConfig {
            auth: Phase { defaults: auth_defaults, matches: auth_matches },
            header_ops: Phase { defaults: header_ops_defaults, matches: header_ops_matches },
        },
        request: RequestTransformConfig { phase: Phase { defaults: request_defaults, matches: request_matches } },
        response: ResponseConfig { phase: Phase { defaults: response_defaults, matches: response_matches } },
        error: ErrorConfig { phase: Phase { defaults: error_defaults, matches: error_matches } },
        usage: UsageConfig { phase: Phase { defaults: usage_defaults, matches: usage_matches } },
        finish_reason: FinishReasonConfig { phase: Phase { defaults: finish_reason_defaults, matches: finish_reason_matches } },
        balance,
    })
}

fn parse_match_api(m: &RawMatchBlock) -> Result<Api, BuildError> {
    Api::parse(&m.api).ok_or_else(|| BuildError::Directive {
        line: m.line,
        col: m.col,
        message: format!("unknown api {:?}", m.api),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use onr_dsl_parser::parse_str;

    fn parse(src: &str) -> RawProvider {
        let doc = parse_str(src, std::path::Path::new("openai.conf")).unwrap();
        doc.providers.into_iter().next().unwrap()
    }

    #[test]
    fn builds_minimal_provider() {
        let raw = parse(
            r#"
provider "openai" {
  defaults {
    upstream_config { base_url "https://api.openai.com"; }
  }
  match api = "chat.completions" stream = true {
    upstream { set_path "/v1/chat/completions"; }
  }
}
"#,
        );
        let file = build_provider_file(&raw, "openai").unwrap();
        assert_eq!(file.name, "openai");
        assert!(file.routing.base_url_expr.is_some());
        assert_eq!(file.routing.matches.len(), 1);
        assert_eq!(file.routing.matches[0].api, Api::ChatCompletions);
        assert_eq!(file.routing.matches[0].stream, Some(true));
    }

    #[test]
    fn rejects_name_not_matching_file_stem() {
        let raw = parse(r#"provider "openai" { defaults {} }"#);
        let err = build_provider_file(&raw, "azure").unwrap_err();
        assert!(matches!(err, BuildError::NameMismatch { .. }));
    }

    #[test]
    fn rejects_invalid_name() {
        let raw = parse(r#"provider "OpenAI" { defaults {} }"#);
        let err = build_provider_file(&raw, "OpenAI").unwrap_err();
        assert!(matches!(err, BuildError::InvalidName(_)));
    }

    #[test]
    fn parses_oauth_directives_into_auth_config() {
        let raw = parse(
            r#"
provider "qwen" {
  defaults {
    auth {
      auth_oauth_bearer;
      oauth_mode "qwen";
      oauth_token_url "https://example.test/token";
      oauth_refresh_token "rt-123";
      oauth_timeout_secs "10";
    }
  }
}
"#,
        );
        let file = build_provider_file(&raw, "qwen").unwrap();
        assert!(file.headers.auth.defaults.auth_oauth_bearer);
        let oauth = file.headers.auth.defaults.oauth.unwrap();
        assert_eq!(oauth.mode, Some(OAuthMode::Qwen));
        assert_eq!(oauth.token_url.as_deref(), Some("https://example.test/token"));
        assert_eq!(oauth.timeout_secs, Some(10));
    }

    #[test]
    fn json_set_parses_path_and_value() {
        let raw = parse(
            r#"
provider "openai" {
  defaults {
    request { json_set "$.stream" "true"; }
  }
}
"#,
        );
        let file = build_provider_file(&raw, "openai").unwrap();
        let op = &file.request.phase.defaults.json_ops[0];
        assert_eq!(op.kind, JsonOpKind::Set);
        assert_eq!(op.path.as_str(), "$.stream");
    }

    #[test]
    fn custom_usage_mode_without_extraction_is_rejected() {
        let raw = parse(
            r#"
provider "custom" {
  defaults {
    metrics { usage_mode "custom"; }
  }
}
"#,
        );
        assert!(build_provider_file(&raw, "custom").is_err());
    }

    #[test]
    fn sse_json_del_if_requires_non_empty_equals() {
        let raw = parse(
            r#"
provider "openai" {
  defaults {
    response { sse_json_del_if "$.type" "" "$.foo"; }
  }
}
"#,
        );
        assert!(build_provider_file(&raw, "openai").is_err());
    }

    #[test]
    fn rejects_empty_base_url() {
        let raw = parse(r#"provider "openai" { defaults { upstream_config { base_url ""; } } }"#);
        assert!(build_provider_file(&raw, "openai").is_err());
    }

    #[test]
    fn rejects_base_url_without_scheme_and_host() {
        let raw = parse(r#"provider "openai" { defaults { upstream_config { base_url "api.openai.com"; } } }"#);
        let err = build_provider_file(&raw, "openai").unwrap_err();
        assert!(matches!(err, BuildError::Directive { .. }));

        let raw = parse(r#"provider "openai" { defaults { upstream_config { base_url "https://"; } } }"#);
        assert!(build_provider_file(&raw, "openai").is_err());
    }

    #[test]
    fn accepts_absolute_base_url() {
        let raw = parse(r#"provider "openai" { defaults { upstream_config { base_url "https://api.openai.com"; } } }"#);
        assert!(build_provider_file(&raw, "openai").is_ok());
    }

    #[test]
    fn custom_oauth_without_token_url_or_form_field_is_rejected_at_build_time() {
        let raw = parse(
            r#"
provider "custom" {
  defaults {
    auth { oauth_mode "custom"; }
  }
}
"#,
        );
        let err = build_provider_file(&raw, "custom").unwrap_err();
        assert!(matches!(err, BuildError::Directive { .. }));
    }

    #[test]
    fn custom_oauth_with_token_url_and_form_field_builds() {
        let raw = parse(
            r#"
provider "custom" {
  defaults {
    auth {
      oauth_mode "custom";
      oauth_token_url "https://example.test/token";
      oauth_form_field "grant_type" "refresh_token";
    }
  }
}
"#,
        );
        assert!(build_provider_file(&raw, "custom").is_ok());
    }

    #[test]
    fn unknown_directive_in_phase_is_rejected() {
        let raw = parse(
            r#"
provider "openai" {
  defaults {
    request { made_up_directive "x"; }
  }
}
"#,
        );
        assert!(build_provider_file(&raw, "openai").is_err());
    }
}
