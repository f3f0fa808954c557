//! String expression grammar: `literal | var | concat(expr, ...)`.

use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("expected ',' or ')' in concat argument list")]
    ExpectedCommaOrParen,
    #[error("empty expression")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Var {
    ChannelBaseUrl,
    ChannelKey,
    OAuthAccessToken,
    RequestModel,
    RequestModelMapped,
    /// Any token that does not match a known variable. Evaluates to itself.
    Unknown(String),
}

impl Var {
    fn parse(raw: &str) -> Var {
        match raw {
            "$channel.base_url" => Var::ChannelBaseUrl,
            "$channel.key" => Var::ChannelKey,
            "$oauth.access_token" => Var::OAuthAccessToken,
            "$request.model" => Var::RequestModel,
            "$request.model_mapped" => Var::RequestModelMapped,
            other => Var::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(String),
    Var(Var),
    Concat(Vec<Expr>),
}

/// Values visible to an expression at evaluation time. Every field is resolved
/// by the caller (Meta + optional OAuth token) before evaluation starts;
/// expressions never reach back into Meta themselves.
pub struct EvalCtx<'a> {
    pub channel_base_url: &'a str,
    pub channel_key: &'a str,
    pub oauth_access_token: Option<&'a str>,
    pub request_model: &'a str,
    pub request_model_mapped: &'a str,
}

impl Var {
    pub fn eval(&self, ctx: &EvalCtx) -> String {
        match self {
            Var::ChannelBaseUrl => ctx.channel_base_url.to_string(),
            Var::ChannelKey => ctx.channel_key.to_string(),
            Var::OAuthAccessToken => ctx.oauth_access_token.unwrap_or("").to_string(),
            Var::RequestModel => ctx.request_model.to_string(),
            Var::RequestModelMapped => ctx.request_model_mapped.to_string(),
            Var::Unknown(s) => s.clone(),
        }
    }
}

impl Expr {
    pub fn eval(&self, ctx: &EvalCtx) -> String {
        match self {
            Expr::Literal(s) => s.clone(),
            Expr::Var(v) => v.eval(ctx),
            Expr::Concat(parts) => parts.iter().map(|p| p.eval(ctx)).collect::<Vec<_>>().concat(),
        }
    }

    pub fn literal(s: impl Into<String>) -> Expr {
        Expr::Literal(s.into())
    }

    pub fn concat2(a: Expr, b: Expr) -> Expr {
        Expr::Concat(vec![a, b])
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(s) => write!(f, "{s:?}"),
            Expr::Var(Var::Unknown(s)) => write!(f, "{s}"),
            Expr::Var(v) => write!(f, "{}", var_source(v)),
            Expr::Concat(parts) => {
                write!(f, "concat(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn var_source(v: &Var) -> &'static str {
    match v {
        Var::ChannelBaseUrl => "$channel.base_url",
        Var::ChannelKey => "$channel.key",
        Var::OAuthAccessToken => "$oauth.access_token",
        Var::RequestModel => "$request.model",
        Var::RequestModelMapped => "$request.model_mapped",
        Var::Unknown(_) => unreachable!(),
    }
}

/// Parses a single expression from source text, e.g. `"literal"`, `$channel.key`,
/// or `concat("Bearer ", $channel.key)`.
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let mut lex = Lexer::new(input);
    let expr = parse_expr(&mut lex)?;
    lex.skip_ws();
    if !lex.is_empty() {
        return Err(ExprError::UnexpectedToken(lex.rest().to_string()));
    }
    Ok(expr)
}

fn parse_expr(lex: &mut Lexer<'_>) -> Result<Expr, ExprError> {
    lex.skip_ws();
    if lex.is_empty() {
        return Err(ExprError::Empty);
    }
    if lex.peek() == Some('"') {
        return Ok(Expr::Literal(lex.read_quoted_string()?));
    }
    if lex.peek() == Some('$') {
        let tok = lex.read_bare_token();
        return Ok(Expr::Var(Var::parse(&tok)));
    }
    if lex.starts_with_ident("concat") {
        lex.advance_bytes("concat".len());
        lex.skip_ws();
        lex.expect_char('(')?;
        let mut args = Vec::new();
        loop {
            args.push(parse_expr(lex)?);
            lex.skip_ws();
            match lex.peek() {
                Some(',') => {
                    lex.advance_bytes(1);
                    continue;
                }
                Some(')') => {
                    lex.advance_bytes(1);
                    break;
                }
                _ => return Err(ExprError::ExpectedCommaOrParen),
            }
        }
        return Ok(Expr::Concat(args));
    }
    Err(ExprError::UnexpectedToken(lex.rest().to_string()))
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn advance_bytes(&mut self, n: usize) {
        self.pos += n;
    }

    fn starts_with_ident(&self, ident: &str) -> bool {
        self.rest().starts_with(ident)
    }

    fn expect_char(&mut self, c: char) -> Result<(), ExprError> {
        if self.peek() == Some(c) {
            self.advance_bytes(c.len_utf8());
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken(self.rest().to_string()))
        }
    }

    fn read_quoted_string(&mut self) -> Result<String, ExprError> {
        self.expect_char('"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(ExprError::UnterminatedString),
                Some('"') => {
                    self.advance_bytes(1);
                    return Ok(out);
                }
                Some('\\') => {
                    self.advance_bytes(1);
                    match self.peek() {
                        Some('n') => {
                            out.push('\n');
                            self.advance_bytes(1);
                        }
                        Some('t') => {
                            out.push('\t');
                            self.advance_bytes(1);
                        }
                        Some('"') => {
                            out.push('"');
                            self.advance_bytes(1);
                        }
                        Some('\\') => {
                            out.push('\\');
                            self.advance_bytes(1);
                        }
                        Some(other) => {
                            out.push(other);
                            self.advance_bytes(other.len_utf8());
                        }
                        None => return Err(ExprError::UnterminatedString),
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.advance_bytes(c.len_utf8());
                }
            }
        }
    }

    /// Reads a `$`-prefixed token up to the next whitespace, comma, or paren.
    fn read_bare_token(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' || c == ')' || c == '(' {
                break;
            }
            self.advance_bytes(c.len_utf8());
        }
        self.src[start..self.pos].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EvalCtx<'static> {
        EvalCtx {
            channel_base_url: "https://api.example.com",
            channel_key: "sk-live",
            oauth_access_token: Some("tok-123"),
            request_model: "gpt-4o",
            request_model_mapped: "gpt-4o-mapped",
        }
    }

    #[test]
    fn literal_roundtrip() {
        let e = parse("\"hello\"").unwrap();
        assert_eq!(e.eval(&ctx()), "hello");
    }

    #[test]
    fn channel_key_var() {
        let e = parse("$channel.key").unwrap();
        assert_eq!(e.eval(&ctx()), "sk-live");
    }

    #[test]
    fn unknown_var_evaluates_to_itself() {
        let e = parse("$totally.unknown").unwrap();
        assert_eq!(e.eval(&ctx()), "$totally.unknown");
    }

    #[test]
    fn concat_joins_args() {
        let e = parse("concat(\"Bearer \", $channel.key)").unwrap();
        assert_eq!(e.eval(&ctx()), "Bearer sk-live");
    }

    #[test]
    fn empty_oauth_token_expands_empty() {
        let e = parse("$oauth.access_token").unwrap();
        let mut c = ctx();
        c.oauth_access_token = None;
        assert_eq!(e.eval(&c), "");
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse("\"a\" \"b\"").is_err());
    }
}
