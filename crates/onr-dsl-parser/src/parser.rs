//! Recursive-descent parser over the token stream: `syntax`, `include`, and
//! `provider` blocks at top level; `defaults`/`match` and their phase blocks
//! inside a provider.

use std::path::{Path, PathBuf};

use crate::ast::{RawBlock, RawDocument, RawMatchBlock, RawProvider, RawStatement};
use crate::lexer::{tokenize, LexError, Token, TokenKind};

pub const MAX_INCLUDE_DEPTH: usize = 20;

/// Directives removed from the grammar; kept so reworked configs fail loudly
/// instead of silently doing nothing.
const REMOVED_DIRECTIVES: &[(&str, &str)] = &[
    ("header_set", "header_set has been removed; use set_header"),
    ("query_set", "query_set has been removed; use set_query"),
];

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{path}: {source}")]
    Lex { path: String, source: LexError },
    #[error("{path}:{line}:{col}: {message}")]
    Syntax { path: String, line: u32, col: u32, message: String },
    #[error("{path}:{line}:{col}: {directive} has been removed; use a non-legacy form")]
    RemovedDirective { path: String, line: u32, col: u32, directive: String },
    #[error("{path}: include cycle detected")]
    IncludeCycle { path: String },
    #[error("{path}: include depth exceeds {MAX_INCLUDE_DEPTH}")]
    IncludeTooDeep { path: String },
    #[error("{path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("{later}: syntax marker {later_version:?} does not match {earlier}'s {earlier_version:?}")]
    SyntaxMismatch {
        earlier: String,
        earlier_version: String,
        later: String,
        later_version: String,
    },
}

/// Parses a single file, resolving `include` directives relative to it.
/// `include` cycles and a depth of more than [`MAX_INCLUDE_DEPTH`] are fatal.
pub fn parse_file(path: &Path) -> Result<RawDocument, ParseError> {
    let mut stack = Vec::new();
    parse_file_with_stack(path, &mut stack)
}

/// Parses already-loaded source text as if it were `virtual_path` (used by
/// the registry when a file's bytes are already in hand, and in tests).
pub fn parse_str(src: &str, virtual_path: &Path) -> Result<RawDocument, ParseError> {
    let mut stack = Vec::new();
    parse_tokens(src, virtual_path, &mut stack)
}

/// Forward-scans for the first `provider "<name>"` occurrence without a full
/// parse, used by the registry to discover a file's provider name before
/// deciding whether to parse it at all.
pub fn discover_provider_name(src: &str) -> Option<String> {
    let tokens = tokenize(src).ok()?;
    for w in tokens.windows(2) {
        if w[0].kind == TokenKind::Ident && w[0].text == "provider" && w[1].kind == TokenKind::String {
            return Some(w[1].text.clone());
        }
    }
    None
}

fn parse_file_with_stack(path: &Path, stack: &mut Vec<PathBuf>) -> Result<RawDocument, ParseError> {
    let canon = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if stack.contains(&canon) {
        return Err(ParseError::IncludeCycle { path: path.display().to_string() });
    }
    if stack.len() >= MAX_INCLUDE_DEPTH {
        return Err(ParseError::IncludeTooDeep { path: path.display().to_string() });
    }
    let src = std::fs::read_to_string(path)
        .map_err(|source| ParseError::Io { path: path.display().to_string(), source })?;
    stack.push(canon);
    let result = parse_tokens(&src, path, stack);
    stack.pop();
    result
}

fn parse_tokens(src: &str, path: &Path, stack: &mut Vec<PathBuf>) -> Result<RawDocument, ParseError> {
    let path_str = path.display().to_string();
    let tokens = tokenize(src).map_err(|source| ParseError::Lex { path: path_str.clone(), source })?;
    let mut p = Parser { tokens: &tokens, pos: 0, path: &path_str };
    let mut doc = RawDocument { syntax: None, providers: Vec::new() };

    while !p.at_end() {
        let tok = p.peek_ident()?;
        match tok.text.as_str() {
            "syntax" => {
                p.advance();
                let version = p.expect_string()?;
                p.expect_semi()?;
                if let Some(existing) = &doc.syntax {
                    if existing != &version {
                        return Err(ParseError::SyntaxMismatch {
                            earlier: path_str.clone(),
                            earlier_version: existing.clone(),
                            later: path_str.clone(),
                            later_version: version,
                        });
                    }
                } else {
                    doc.syntax = Some(version);
                }
            }
            "include" => {
                p.advance();
                let rel = p.expect_string()?;
                p.expect_semi()?;
                let include_path = resolve_include_path(path, &rel);
                let included = parse_file_with_stack(&include_path, stack)?;
                if let Some(inc_syntax) = &included.syntax {
                    match &doc.syntax {
                        Some(existing) if existing != inc_syntax => {
                            return Err(ParseError::SyntaxMismatch {
                                earlier: path_str.clone(),
                                earlier_version: existing.clone(),
                                later: include_path.display().to_string(),
                                later_version: inc_syntax.clone(),
                            });
                        }
                        None => doc.syntax = Some(inc_syntax.clone()),
                        _ => {}
                    }
                }
                doc.providers.extend(included.providers);
            }
            "provider" => {
                let provider = p.parse_provider()?;
                doc.providers.push(provider);
            }
            other => {
                return Err(p.syntax_err(format!("unexpected top-level directive {other:?}")));
            }
        }
    }

    Ok(doc)
}

fn resolve_include_path(including_file: &Path, rel: &str) -> PathBuf {
    let candidate = Path::new(rel);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        including_file
            .parent()
            .map(|dir| dir.join(candidate))
            .unwrap_or_else(|| candidate.to_path_buf())
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    path: &'a str,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn last_pos(&self) -> (u32, u32) {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| (t.line, t.col))
            .unwrap_or((0, 0))
    }

    fn syntax_err(&self, message: String) -> ParseError {
        let (line, col) = self.peek().map(|t| (t.line, t.col)).unwrap_or_else(|| self.last_pos());
        ParseError::Syntax { path: self.path.to_string(), line, col, message }
    }

    fn peek_ident(&self) -> Result<&Token, ParseError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident => Ok(t),
            Some(t) => Err(ParseError::Syntax {
                path: self.path.to_string(),
                line: t.line,
                col: t.col,
                message: format!("expected identifier, found {:?}", t.text),
            }),
            None => Err(ParseError::Syntax {
                path: self.path.to_string(),
                line: 0,
                col: 0,
                message: "unexpected end of input".to_string(),
            }),
        }
    }

    fn expect_ident_text(&mut self, text: &str) -> Result<(), ParseError> {
        let tok = self.peek_ident()?.clone();
        if tok.text != text {
            return Err(self.syntax_err(format!("expected `{text}`, found `{}`", tok.text)));
        }
        self.advance();
        Ok(())
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(t) if t.kind == TokenKind::String => Ok(t.text.clone()),
            Some(t) => Err(ParseError::Syntax {
                path: self.path.to_string(),
                line: t.line,
                col: t.col,
                message: format!("expected a quoted string, found `{}`", t.text),
            }),
            None => Err(self.syntax_err("expected a quoted string, found end of input".to_string())),
        }
    }

    fn expect_semi(&mut self) -> Result<(), ParseError> {
        match self.advance() {
            Some(t) if t.kind == TokenKind::Semi => Ok(()),
            Some(t) => Err(ParseError::Syntax {
                path: self.path.to_string(),
                line: t.line,
                col: t.col,
                message: format!("expected `;`, found `{}`", t.text),
            }),
            None => Err(self.syntax_err("expected `;`, found end of input".to_string())),
        }
    }

    fn expect_lbrace(&mut self) -> Result<(), ParseError> {
        match self.advance() {
            Some(t) if t.kind == TokenKind::LBrace => Ok(()),
            Some(t) => Err(ParseError::Syntax {
                path: self.path.to_string(),
                line: t.line,
                col: t.col,
                message: format!("expected `{{`, found `{}`", t.text),
            }),
            None => Err(self.syntax_err("expected `{`, found end of input".to_string())),
        }
    }

    fn at_rbrace(&self) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::RBrace)
    }

    fn expect_rbrace(&mut self) -> Result<(), ParseError> {
        match self.advance() {
            Some(t) if t.kind == TokenKind::RBrace => Ok(()),
            Some(t) => Err(ParseError::Syntax {
                path: self.path.to_string(),
                line: t.line,
                col: t.col,
                message: format!("expected `}}`, found `{}`", t.text),
            }),
            None => Err(self.syntax_err("expected `}`, found end of input".to_string())),
        }
    }

    fn parse_provider(&mut self) -> Result<RawProvider, ParseError> {
        let (name_line, name_col) = self.peek().map(|t| (t.line, t.col)).unwrap_or((0, 0));
        self.expect_ident_text("provider")?;
        let name = self.expect_string()?;
        self.expect_lbrace()?;

        let mut defaults = RawBlock::default();
        let mut matches = Vec::new();

        while !self.at_rbrace() {
            let tok = self.peek_ident()?.clone();
            match tok.text.as_str() {
                "defaults" => {
                    self.advance();
                    self.expect_lbrace()?;
                    defaults = self.parse_phase_block()?;
                    self.expect_rbrace()?;
                }
                "match" => {
                    matches.push(self.parse_match()?);
                }
                other => {
                    return Err(self.syntax_err(format!("unexpected directive `{other}` inside provider block")));
                }
            }
        }
        self.expect_rbrace()?;

        Ok(RawProvider { name, name_line, name_col, defaults, matches })
    }

    fn parse_match(&mut self) -> Result<RawMatchBlock, ParseError> {
        let (line, col) = self.peek().map(|t| (t.line, t.col)).unwrap_or((0, 0));
        self.expect_ident_text("match")?;
        self.expect_ident_text("api")?;
        self.expect_other("=")?;
        let api = self.expect_string()?;

        let mut stream = None;
        if matches!(self.peek(), Some(t) if t.kind == TokenKind::Ident && t.text == "stream") {
            self.advance();
            self.expect_other("=")?;
            let tok = self.peek_ident()?.clone();
            stream = match tok.text.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                other => return Err(self.syntax_err(format!("expected `true` or `false`, found `{other}`"))),
            };
            self.advance();
        }

        self.expect_lbrace()?;
        let block = self.parse_phase_block()?;
        self.expect_rbrace()?;

        Ok(RawMatchBlock { api, stream, block, line, col })
    }

    fn expect_other(&mut self, text: &str) -> Result<(), ParseError> {
        match self.advance() {
            Some(t) if t.kind == TokenKind::Other && t.text == text => Ok(()),
            Some(t) => Err(ParseError::Syntax {
                path: self.path.to_string(),
                line: t.line,
                col: t.col,
                message: format!("expected `{text}`, found `{}`", t.text),
            }),
            None => Err(self.syntax_err(format!("expected `{text}`, found end of input"))),
        }
    }

    /// A phase block contains `phase_name { statement; ... }` entries, e.g.
    /// `upstream_config { base_url = "..."; }`.
    fn parse_phase_block(&mut self) -> Result<RawBlock, ParseError> {
        let mut block = RawBlock::default();
        while !self.at_rbrace() {
            let phase_tok = self.peek_ident()?.clone();
            self.advance();
            self.expect_lbrace()?;
            let mut statements = Vec::new();
            while !self.at_rbrace() {
                statements.push(self.parse_statement()?);
            }
            self.expect_rbrace()?;
            block.phases.entry(phase_tok.text).or_default().extend(statements);
        }
        Ok(block)
    }

    fn parse_statement(&mut self) -> Result<RawStatement, ParseError> {
        let name_tok = self.peek_ident()?.clone();
        if let Some((_, message)) = REMOVED_DIRECTIVES.iter().find(|(n, _)| *n == name_tok.text) {
            return Err(ParseError::RemovedDirective {
                path: self.path.to_string(),
                line: name_tok.line,
                col: name_tok.col,
                directive: message.to_string(),
            });
        }
        self.advance();
        // Optional assignment-style `=` right after the directive name.
        if matches!(self.peek(), Some(t) if t.kind == TokenKind::Other && t.text == "=") {
            self.advance();
        }
        let mut args = Vec::new();
        while !matches!(self.peek(), Some(t) if t.kind == TokenKind::Semi) {
            match self.advance() {
                Some(t) => args.push(t.clone()),
                None => return Err(self.syntax_err(format!("unterminated directive `{}`", name_tok.text))),
            }
        }
        self.expect_semi()?;
        Ok(RawStatement { name: name_tok.text, args, line: name_tok.line, col: name_tok.col })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_provider() {
        let src = r#"
syntax "next-router/0.1";
provider "openai" {
  defaults {
    upstream_config { base_url = "https://api.openai.com"; }
  }
  match api = "chat.completions" stream = true {
    upstream { set_path "/v1/chat/completions"; }
  }
}
"#;
        let doc = parse_str(src, Path::new("openai.conf")).unwrap();
        assert_eq!(doc.syntax.as_deref(), Some("next-router/0.1"));
        assert_eq!(doc.providers.len(), 1);
        let provider = &doc.providers[0];
        assert_eq!(provider.name, "openai");
        assert_eq!(provider.matches.len(), 1);
        assert_eq!(provider.matches[0].api, "chat.completions");
        assert_eq!(provider.matches[0].stream, Some(true));
    }

    #[test]
    fn removed_directive_names_itself_in_error() {
        let src = r#"provider "x" { defaults { request { header_set "a" "b"; } } }"#;
        let err = parse_str(src, Path::new("x.conf")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("header_set"), "error was: {msg}");
    }

    #[test]
    fn discovers_provider_name_without_full_parse() {
        let src = r#"provider "anthropic" { defaults {} }"#;
        assert_eq!(discover_provider_name(src).as_deref(), Some("anthropic"));
    }
}
