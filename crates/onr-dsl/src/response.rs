//! Response Transform (§4.7): resolve the response mode for a
//! (api, is_stream) pair, apply the non-streaming body pipeline, and map
//! upstream error bodies (§4.7 "Error Mapping").
//!
//! Streaming responses never reach `apply_body` -- the host routes them to
//! [`crate::sse`] instead, selected by [`resolve`] returning
//! [`ResolvedMode::Sse`].

use onr_expr::{EvalCtx, path};
use serde_json::Value;

use crate::dialects;
use crate::jsonops::{self, JsonOpsError};
use crate::meta::Api;
use crate::model::{ErrorConfig, ErrorMapMode, ResponseConfig, ResponseMode, SseParseMode};

#[derive(Debug, thiserror::Error)]
pub enum ResponseTransformError {
    #[error(transparent)]
    JsonOps(#[from] JsonOpsError),
}

/// What a (api, is_stream) pair resolves to, after merging defaults with any
/// matching `match` block's `resp_passthrough`/`resp_map`/`sse_parse`
/// directive (last one in declaration order wins, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedMode {
    Passthrough,
    RespMap(crate::model::RespMapMode),
    Sse(SseParseMode),
}

pub fn resolve(response: &ResponseConfig, api: Api, is_stream: bool) -> ResolvedMode {
    let mode = response
        .phase
        .select(api, is_stream)
        .map(|m| m.payload.mode)
        .unwrap_or(response.phase.defaults.mode);
    match mode {
        ResponseMode::Passthrough => ResolvedMode::Passthrough,
        ResponseMode::RespMap(m) => ResolvedMode::RespMap(m),
        ResponseMode::SseParse(m) => ResolvedMode::Sse(m),
    }
}

/// Non-streaming response body pipeline: built-in `resp_map` (if resolved),
/// then declarative JSON ops (match concatenated after defaults, same rule
/// as the request side).
pub fn apply_body(body: Value, response: &ResponseConfig, api: Api, is_stream: bool, ctx: &EvalCtx) -> Result<Value, ResponseTransformError> {
    let mut body = match resolve(response, api, is_stream) {
        ResolvedMode::Passthrough => body,
        ResolvedMode::RespMap(mode) => dialects::resp_map::apply(mode, body),
        ResolvedMode::Sse(_) => body,
    };

    let mut json_ops = response.phase.defaults.json_ops.clone();
    if let Some(m) = response.phase.select(api, is_stream) {
        json_ops.extend(m.payload.json_ops.clone());
    }
    let eval = |e: &onr_expr::Expr| e.eval(ctx);
    jsonops::apply_json_ops(&mut body, &json_ops, eval)?;
    Ok(body)
}

/// `sse_del_if`: drop a field from a (already-parsed) JSON chunk when a
/// condition path equals a literal string (§4.7, §4.8). Used by the SSE
/// translators between re-serializing chunks.
pub fn apply_sse_del_ifs(chunk: &mut Value, response: &ResponseConfig, api: Api, is_stream: bool) {
    let mut del_ifs = response.phase.defaults.sse_del_ifs.clone();
    if let Some(m) = response.phase.select(api, is_stream) {
        del_ifs.extend(m.payload.sse_del_ifs.iter().cloned());
    }
    for rule in &del_ifs {
        let matches = path::eval_read(chunk, &rule.cond_path);
        let hit = matches.iter().any(|v| v.as_str() == Some(rule.equals.as_str()));
        if hit {
            let _ = path::del(chunk, &rule.del_path);
        }
    }
}

/// Maps an upstream error body per the resolved `error_map` mode (§4.7).
/// `Passthrough` and an absent directive both mean "ship upstream's body
/// unchanged".
pub fn map_error(body: Value, error: &ErrorConfig, api: Api, is_stream: bool) -> Value {
    let mode = error
        .phase
        .select(api, is_stream)
        .and_then(|m| m.payload.mode)
        .or(error.phase.defaults.mode);
    match mode {
        None | Some(ErrorMapMode::Passthrough) => body,
        Some(ErrorMapMode::Openai) => to_openai_error_shape(body),
        Some(ErrorMapMode::Common) => to_common_error_shape(body),
    }
}

fn to_openai_error_shape(body: Value) -> Value {
    if body.get("error").is_some() {
        return body;
    }
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| body.as_str())
        .unwrap_or("upstream error")
        .to_string();
    serde_json::json!({ "error": { "message": message, "type": "upstream_error" } })
}

fn to_common_error_shape(body: Value) -> Value {
    if body.get("message").is_some() && body.get("error").is_none() {
        return body;
    }
    let message = body
        .get("error")
        .and_then(|e| e.get("message").and_then(Value::as_str).or_else(|| e.as_str()))
        .or_else(|| body.as_str())
        .unwrap_or("upstream error")
        .to_string();
    serde_json::json!({ "message": message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Match, ResponseDirectives};
    use serde_json::json;

    #[test]
    fn resolve_prefers_match_over_default() {
        let response = ResponseConfig {
            phase: crate::model::Phase {
                defaults: ResponseDirectives::default(),
                matches: vec![Match {
                    api: Api::ChatCompletions,
                    stream: None,
                    payload: ResponseDirectives {
                        mode: ResponseMode::RespMap(crate::model::RespMapMode::OpenaiResponsesToOpenaiChat),
                        ..Default::default()
                    },
                }],
            },
        };
        assert_eq!(
            resolve(&response, Api::ChatCompletions, false),
            ResolvedMode::RespMap(crate::model::RespMapMode::OpenaiResponsesToOpenaiChat)
        );
        assert_eq!(resolve(&response, Api::Embeddings, false), ResolvedMode::Passthrough);
    }

    #[test]
    fn map_error_openai_wraps_bare_message() {
        let error = ErrorConfig {
            phase: crate::model::Phase {
                defaults: crate::model::ErrorDirectives { mode: Some(ErrorMapMode::Openai) },
                matches: vec![],
            },
        };
        let out = map_error(json!({"message": "bad key"}), &error, Api::ChatCompletions, false);
        assert_eq!(out["error"]["message"], json!("bad key"));
    }

    #[test]
    fn sse_del_if_removes_matching_field() {
        let response = ResponseConfig {
            phase: crate::model::Phase {
                defaults: ResponseDirectives {
                    sse_del_ifs: vec![crate::model::SseJsonDelIf {
                        cond_path: onr_expr::ReadPath::parse("$.type").unwrap(),
                        equals: "ping".to_string(),
                        del_path: onr_expr::WritePath::parse("$.data").unwrap(),
                    }],
                    ..Default::default()
                },
                matches: vec![],
            },
        };
        let mut chunk = json!({"type": "ping", "data": "keepalive"});
        apply_sse_del_ifs(&mut chunk, &response, Api::ChatCompletions, true);
        assert_eq!(chunk, json!({"type": "ping"}));
    }
}
