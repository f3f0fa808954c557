//! Routing Engine (§4.4): select a `match` by (api, stream), then rewrite
//! `Meta.base_url`/`request_url_path` from it.
//!
//! `request_url_path` is path+query only (never a full URL), so query
//! manipulation is a plain key/value list, not a general URL parse.

use onr_expr::EvalCtx;

use crate::meta::Meta;
use crate::model::RoutingConfig;

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("provider has no config for api={api} stream={stream}")]
    NoMatch { api: String, stream: bool },
}

fn split_path_query(path_and_query: &str) -> (&str, Vec<(String, String)>) {
    match path_and_query.split_once('?') {
        None => (path_and_query, Vec::new()),
        Some((path, query)) => {
            let pairs = query
                .split('&')
                .filter(|p| !p.is_empty())
                .map(|p| match p.split_once('=') {
                    Some((k, v)) => (urlencoding::decode(k).unwrap_or_default().into_owned(), urlencoding::decode(v).unwrap_or_default().into_owned()),
                    None => (urlencoding::decode(p).unwrap_or_default().into_owned(), String::new()),
                })
                .collect();
            (path, pairs)
        }
    }
}

fn join_path_query(path: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let qs = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{qs}")
}

/// Applies routing for `meta` against `routing`. A missing match is the one
/// case where "no match" is a hard error for the host to surface as 400
/// (§3, §7) -- every other phase's "no match" just means "defaults only".
pub fn apply(meta: &mut Meta, routing: &RoutingConfig, ctx: &EvalCtx) -> Result<(), RoutingError> {
    let m = routing.matches.iter().find(|m| m.api == meta.api && m.stream.is_none_or(|s| s == meta.is_stream));
    let Some(m) = m else {
        return Err(RoutingError::NoMatch { api: meta.api.to_string(), stream: meta.is_stream });
    };

    // Channel override takes precedence: only evaluate base_url_expr when
    // Meta.base_url hasn't already been set by the host/pool.
    if meta.base_url.is_empty() {
        if let Some(expr) = &routing.base_url_expr {
            meta.base_url = expr.eval(ctx);
        }
    }

    let (path, mut pairs) = split_path_query(&meta.request_url_path);
    let mut path = path.to_string();

    if let Some(set_path) = &m.payload.set_path {
        path = set_path.eval(ctx);
    }

    for del in &m.payload.del_query {
        let key = del.eval(ctx);
        pairs.retain(|(k, _)| k != &key);
    }
    for (key_expr, value_expr) in &m.payload.set_query {
        let key = key_expr.eval(ctx);
        let value = value_expr.eval(ctx);
        pairs.retain(|(k, _)| k != &key);
        pairs.push((key, value));
    }

    meta.request_url_path = join_path_query(&path, &pairs);
    Ok(())
}

pub fn has_match(meta: &Meta, routing: &RoutingConfig) -> bool {
    routing.matches.iter().any(|m| m.api == meta.api && m.stream.is_none_or(|s| s == meta.is_stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Api;
    use crate::model::{Match, RoutingDirectives};
    use onr_expr::Expr;

    fn ctx() -> EvalCtx<'static> {
        EvalCtx {
            channel_base_url: "",
            channel_key: "",
            oauth_access_token: None,
            request_model: "",
            request_model_mapped: "",
        }
    }

    #[test]
    fn routing_rewrite_scenario() {
        let mut meta = Meta::new(Api::ChatCompletions, false, "gpt-4o", "/v1/chat/completions?x=1");
        meta.base_url = "https://api.example.com".to_string();
        let routing = RoutingConfig {
            base_url_expr: None,
            matches: vec![Match {
                api: Api::ChatCompletions,
                stream: None,
                payload: RoutingDirectives {
                    set_path: Some(Expr::literal("/v2/chat")),
                    del_query: vec![Expr::literal("x")],
                    set_query: vec![(Expr::literal("api-version"), Expr::literal("2024-10-01"))],
                },
            }],
        };
        apply(&mut meta, &routing, &ctx()).unwrap();
        assert_eq!(meta.request_url_path, "/v2/chat?api-version=2024-10-01");
    }

    #[test]
    fn no_match_is_an_error() {
        let mut meta = Meta::new(Api::Embeddings, false, "text-embedding-3", "/v1/embeddings");
        meta.base_url = "https://api.example.com".to_string();
        let routing = RoutingConfig::default();
        assert!(apply(&mut meta, &routing, &ctx()).is_err());
        assert!(!has_match(&meta, &routing));
    }

    #[test]
    fn channel_override_takes_precedence_over_base_url_expr() {
        let mut meta = Meta::new(Api::ChatCompletions, false, "gpt-4o", "/v1/chat/completions");
        meta.base_url = "https://override.example.com".to_string();
        let routing = RoutingConfig {
            base_url_expr: Some(Expr::literal("https://default.example.com")),
            matches: vec![Match { api: Api::ChatCompletions, stream: None, payload: RoutingDirectives::default() }],
        };
        apply(&mut meta, &routing, &ctx()).unwrap();
        assert_eq!(meta.base_url, "https://override.example.com");
    }
}
