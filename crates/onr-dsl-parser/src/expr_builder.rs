//! Builds `onr_expr::Expr` trees directly from a token slice, instead of
//! re-serializing tokens to text and re-lexing them through
//! `onr_expr::expr::parse`. The DSL lexer already tokenized the source once;
//! there is no reason to pay for a second, string-based lex pass.

use onr_expr::{Expr, Var};

use crate::lexer::{Token, TokenKind};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExprBuildError {
    #[error("expected an expression, found nothing")]
    Empty,
    #[error("unexpected token {0:?} in expression")]
    Unexpected(String),
    #[error("expected ',' or ')' in concat argument list")]
    ExpectedCommaOrParen,
}

fn parse_var(raw: &str) -> Var {
    match raw {
        "$channel.base_url" => Var::ChannelBaseUrl,
        "$channel.key" => Var::ChannelKey,
        "$oauth.access_token" => Var::OAuthAccessToken,
        "$request.model" => Var::RequestModel,
        "$request.model_mapped" => Var::RequestModelMapped,
        other => Var::Unknown(other.to_string()),
    }
}

/// Parses exactly one expression starting at `tokens[*pos]`, advancing `pos`
/// past it.
pub fn build_expr(tokens: &[Token], pos: &mut usize) -> Result<Expr, ExprBuildError> {
    let Some(tok) = tokens.get(*pos) else {
        return Err(ExprBuildError::Empty);
    };
    match tok.kind {
        TokenKind::String => {
            *pos += 1;
            Ok(Expr::Literal(tok.text.clone()))
        }
        TokenKind::Ident if tok.text.starts_with('$') => {
            *pos += 1;
            Ok(Expr::Var(parse_var(&tok.text)))
        }
        TokenKind::Ident if tok.text == "concat" => {
            *pos += 1;
            expect_other(tokens, pos, "(")?;
            let mut args = Vec::new();
            loop {
                args.push(build_expr(tokens, pos)?);
                match tokens.get(*pos) {
                    Some(t) if t.kind == TokenKind::Other && t.text == "," => {
                        *pos += 1;
                        continue;
                    }
                    Some(t) if t.kind == TokenKind::Other && t.text == ")" => {
                        *pos += 1;
                        break;
                    }
                    _ => return Err(ExprBuildError::ExpectedCommaOrParen),
                }
            }
            Ok(Expr::Concat(args))
        }
        _ => Err(ExprBuildError::Unexpected(tok.text.clone())),
    }
}

/// Parses a single expression that must consume the entire remaining slice.
pub fn build_expr_exact(tokens: &[Token]) -> Result<Expr, ExprBuildError> {
    let mut pos = 0;
    let expr = build_expr(tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(ExprBuildError::Unexpected(tokens[pos].text.clone()));
    }
    Ok(expr)
}

fn expect_other(tokens: &[Token], pos: &mut usize, text: &str) -> Result<(), ExprBuildError> {
    match tokens.get(*pos) {
        Some(t) if t.kind == TokenKind::Other && t.text == text => {
            *pos += 1;
            Ok(())
        }
        Some(t) => Err(ExprBuildError::Unexpected(t.text.clone())),
        None => Err(ExprBuildError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn builds_literal() {
        let toks = tokenize("\"hello\"").unwrap();
        let e = build_expr_exact(&toks).unwrap();
        assert_eq!(e, Expr::Literal("hello".to_string()));
    }

    #[test]
    fn builds_concat() {
        let toks = tokenize("concat(\"Bearer \", $channel.key)").unwrap();
        let e = build_expr_exact(&toks).unwrap();
        assert_eq!(
            e,
            Expr::Concat(vec![
                Expr::Literal("Bearer ".to_string()),
                Expr::Var(Var::ChannelKey)
            ])
        );
    }
}
