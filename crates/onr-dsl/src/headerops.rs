//! Header multimap transforms: `set_header`/`del_header`, plus the
//! `auth_bearer`/`auth_header_key` synthesized ops (§4.5 step 2).

use onr_expr::EvalCtx;

use crate::model::{AuthDirectives, HeaderOp, HeaderOpKind};

/// An ordered multimap good enough for header semantics: `set` replaces all
/// prior values for the (case-insensitive) name, `del` removes all values.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: String) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.entries.push((name.to_string(), value));
    }

    pub fn del(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Applies `ops` in declaration order: "the final header value equals the
/// last `set` on that name unless followed by a `del`" (§8).
pub fn apply_header_ops(headers: &mut HeaderMap, ops: &[HeaderOp], ctx: &EvalCtx) {
    for op in ops {
        let name = op.name.eval(ctx);
        match op.kind {
            HeaderOpKind::Set => {
                let value = op.value.as_ref().map(|e| e.eval(ctx)).unwrap_or_default();
                headers.set(&name, value);
            }
            HeaderOpKind::Del => headers.del(&name),
        }
    }
}

/// Expands `auth_bearer`/`auth_header_key` into the header ops they are
/// equivalent to, evaluated with the given context.
pub fn apply_auth_directives(headers: &mut HeaderMap, auth: &AuthDirectives, ctx: &EvalCtx) {
    if auth.auth_bearer {
        headers.set("Authorization", format!("Bearer {}", ctx.channel_key));
    }
    if let Some(name) = &auth.auth_header_key {
        headers.set(name, ctx.channel_key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onr_expr::Expr;

    fn ctx() -> EvalCtx<'static> {
        EvalCtx {
            channel_base_url: "https://api.example.com",
            channel_key: "sk-live",
            oauth_access_token: None,
            request_model: "gpt-4o",
            request_model_mapped: "gpt-4o",
        }
    }

    #[test]
    fn last_set_wins_unless_deleted() {
        let mut h = HeaderMap::new();
        let ops = vec![
            HeaderOp { kind: HeaderOpKind::Set, name: Expr::literal("X-A"), value: Some(Expr::literal("1")) },
            HeaderOp { kind: HeaderOpKind::Set, name: Expr::literal("X-A"), value: Some(Expr::literal("2")) },
        ];
        apply_header_ops(&mut h, &ops, &ctx());
        assert_eq!(h.get("X-A"), Some("2"));

        let ops2 = vec![HeaderOp { kind: HeaderOpKind::Del, name: Expr::literal("X-A"), value: None }];
        apply_header_ops(&mut h, &ops2, &ctx());
        assert_eq!(h.get("X-A"), None);
    }

    #[test]
    fn auth_bearer_synthesizes_header() {
        let mut h = HeaderMap::new();
        let auth = AuthDirectives { auth_bearer: true, ..Default::default() };
        apply_auth_directives(&mut h, &auth, &ctx());
        assert_eq!(h.get("Authorization"), Some("Bearer sk-live"));
    }
}
