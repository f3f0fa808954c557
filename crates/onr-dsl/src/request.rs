//! Request Transform (§4.5): the strict per-request ordering --
//! model map, header ops (+ synthesized auth ops), OAuth bearer injection,
//! built-in `req_map` body mapper, declarative JSON ops.

use onr_expr::EvalCtx;
use onr_oauth::CachedToken;
use serde_json::Value;

use crate::dialects;
use crate::headerops::{self, HeaderMap};
use crate::jsonops::{self, JsonOpsError};
use crate::meta::Meta;
use crate::model::{HeadersConfig, RequestTransformDirectives};

#[derive(Debug, thiserror::Error)]
pub enum RequestTransformError {
    #[error(transparent)]
    JsonOps(#[from] JsonOpsError),
    #[error("req_map rejected the request body: {0}")]
    BodyMap(String),
}

/// Step 1: `model_map`/`model_map_default` computes `mapped_model_name`.
/// Callers apply this before building the `EvalCtx` used by the later steps
/// so `$request.model_mapped` observes the result.
pub fn apply_model_map(meta: &mut Meta, directives: &RequestTransformDirectives) {
    meta.mapped_model_name = directives.model_map.apply(&meta.actual_model_name);
}

/// Steps 2-3: header ops (declaration order) plus synthesized auth ops, then
/// OAuth bearer injection if a token was resolved for this request.
pub fn apply_headers(
    headers: &mut HeaderMap,
    headers_cfg: &HeadersConfig,
    api: crate::meta::Api,
    is_stream: bool,
    ctx: &EvalCtx,
    oauth_token: Option<&CachedToken>,
) {
    if let Some(m) = headers_cfg.auth.select(api, is_stream) {
        headerops::apply_auth_directives(headers, &m.payload, ctx);
    } else {
        headerops::apply_auth_directives(headers, &headers_cfg.auth.defaults, ctx);
    }

    headerops::apply_header_ops(headers, &headers_cfg.header_ops.defaults, ctx);
    if let Some(m) = headers_cfg.header_ops.select(api, is_stream) {
        headerops::apply_header_ops(headers, &m.payload, ctx);
    }

    let uses_oauth = headers_cfg.auth.select(api, is_stream).map(|m| m.payload.auth_oauth_bearer).unwrap_or(headers_cfg.auth.defaults.auth_oauth_bearer);
    if uses_oauth {
        if let Some(token) = oauth_token {
            headers.set("Authorization", format!("{} {}", token.token_type, token.access_token));
        }
    }
}

/// Steps 4-5: built-in `req_map` body mapper, then declarative JSON ops.
/// JSON ops "concatenate with defaults first" when a match overrides them.
pub fn apply_body(body: Value, directives: &RequestTransformDirectives, ctx: &EvalCtx) -> Result<Value, RequestTransformError> {
    let mut body = body;
    if let Some(mode) = directives.req_map {
        body = dialects::req_map::apply(mode, body).map_err(RequestTransformError::BodyMap)?;
    }
    let eval = |e: &onr_expr::Expr| e.eval(ctx);
    jsonops::apply_json_ops(&mut body, &directives.json_ops, eval)?;
    Ok(body)
}

/// Merges defaults and a selected match's directives: model maps merge key
/// by key, `req_map` from the match overrides the default when present,
/// and JSON ops concatenate with defaults first (§4.5).
pub fn merge_directives(defaults: &RequestTransformDirectives, over: Option<&RequestTransformDirectives>) -> RequestTransformDirectives {
    let Some(over) = over else { return defaults.clone() };
    let mut json_ops = defaults.json_ops.clone();
    json_ops.extend(over.json_ops.clone());
    crate::model::RequestTransformDirectives {
        model_map: crate::model::ModelMap::merged(&defaults.model_map, &over.model_map),
        req_map: over.req_map.or(defaults.req_map),
        json_ops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Api;
    use crate::model::ModelMap;

    #[test]
    fn model_map_falls_back_to_actual_name() {
        let mut meta = Meta::new(Api::ChatCompletions, false, "gpt-4o", "/v1/chat/completions");
        let directives = RequestTransformDirectives {
            model_map: ModelMap { map: vec![("gpt-4o".into(), "gpt-4o-2024".into())], default: None },
            ..Default::default()
        };
        apply_model_map(&mut meta, &directives);
        assert_eq!(meta.mapped_model_name, "gpt-4o-2024");

        let mut meta2 = Meta::new(Api::ChatCompletions, false, "unmapped", "/v1/chat/completions");
        apply_model_map(&mut meta2, &directives);
        assert_eq!(meta2.mapped_model_name, "unmapped");
    }

    #[test]
    fn header_ops_apply_defaults_before_match() {
        use crate::model::{HeaderOp, HeaderOpKind};
        use onr_expr::Expr;

        let ctx = onr_expr::EvalCtx {
            channel_base_url: "https://api.example.com",
            channel_key: "sk-live",
            oauth_access_token: None,
            request_model: "gpt-4o",
            request_model_mapped: "gpt-4o",
        };

        let mut headers_cfg = HeadersConfig::default();
        headers_cfg.header_ops.defaults = vec![HeaderOp {
            kind: HeaderOpKind::Set,
            name: Expr::literal("X-A"),
            value: Some(Expr::literal("default")),
        }];
        headers_cfg.header_ops.matches.push(crate::model::Match {
            api: Api::ChatCompletions,
            stream: None,
            payload: vec![HeaderOp {
                kind: HeaderOpKind::Set,
                name: Expr::literal("X-A"),
                value: Some(Expr::literal("match")),
            }],
        });

        let mut headers = HeaderMap::new();
        apply_headers(&mut headers, &headers_cfg, Api::ChatCompletions, false, &ctx, None);
        // The match's `set` runs after the defaults' `set` on the same name,
        // so it wins (§5 ordering guarantee (a), §8 "Header ops order").
        assert_eq!(headers.get("X-A"), Some("match"));
    }

    #[test]
    fn merge_concatenates_json_ops_defaults_first() {
        use crate::model::{JsonOp, JsonOpKind};
        use onr_expr::WritePath;

        let defaults = RequestTransformDirectives {
            json_ops: vec![JsonOp { kind: JsonOpKind::Set, path: WritePath::parse("$.a").unwrap(), value: None, rename_to: None }],
            ..Default::default()
        };
        let over = RequestTransformDirectives {
            json_ops: vec![JsonOp { kind: JsonOpKind::Set, path: WritePath::parse("$.b").unwrap(), value: None, rename_to: None }],
            ..Default::default()
        };
        let merged = merge_directives(&defaults, Some(&over));
        assert_eq!(merged.json_ops.len(), 2);
        assert_eq!(merged.json_ops[0].path.as_str(), "$.a");
        assert_eq!(merged.json_ops[1].path.as_str(), "$.b");
    }
}
