//! Hand-written lexer for the nginx-style provider DSL. Produces a flat
//! token stream; whitespace and comments are consumed but never emitted.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    String,
    /// A bareword identifier, or a `$`-prefixed dotted variable reference
    /// (`$channel.key`). Both are lexed the same way since neither contains
    /// whitespace or DSL punctuation.
    Ident,
    LBrace,
    RBrace,
    Semi,
    /// Any single character not covered above (`=`, `,`, `(`, `)`, ...).
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LexError {
    #[error("{line}:{col}: unterminated string literal")]
    UnterminatedString { line: u32, col: u32 },
    #[error("{line}:{col}: unterminated block comment")]
    UnterminatedComment { line: u32, col: u32 },
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-' | '$' | '.')
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        col: 1,
    };
    lexer.run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn run(&mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();
        loop {
            self.skip_ws_and_comments()?;
            let (line, col) = (self.line, self.col);
            let Some(c) = self.peek() else { break };
            match c {
                '{' => {
                    self.advance();
                    out.push(Token { kind: TokenKind::LBrace, text: "{".into(), line, col });
                }
                '}' => {
                    self.advance();
                    out.push(Token { kind: TokenKind::RBrace, text: "}".into(), line, col });
                }
                ';' => {
                    self.advance();
                    out.push(Token { kind: TokenKind::Semi, text: ";".into(), line, col });
                }
                '"' => {
                    let text = self.read_string(line, col)?;
                    out.push(Token { kind: TokenKind::String, text, line, col });
                }
                c if is_ident_start(c) => {
                    let text = self.read_ident();
                    out.push(Token { kind: TokenKind::Ident, text, line, col });
                }
                _ => {
                    self.advance();
                    out.push(Token { kind: TokenKind::Other, text: c.to_string(), line, col });
                }
            }
        }
        Ok(out)
    }

    fn skip_ws_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let (line, col) = (self.line, self.col);
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => return Err(LexError::UnterminatedComment { line, col }),
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if s.is_empty() {
                if is_ident_start(c) {
                    s.push(c);
                    self.advance();
                    continue;
                }
                break;
            }
            if is_ident_continue(c) {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    fn read_string(&mut self, line: u32, col: u32) -> Result<String, LexError> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString { line, col }),
                Some('"') => {
                    self.advance();
                    return Ok(out);
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('n') => {
                            out.push('\n');
                            self.advance();
                        }
                        Some('t') => {
                            out.push('\t');
                            self.advance();
                        }
                        Some('"') => {
                            out.push('"');
                            self.advance();
                        }
                        Some('\\') => {
                            out.push('\\');
                            self.advance();
                        }
                        Some(other) => {
                            out.push(other);
                            self.advance();
                        }
                        None => return Err(LexError::UnterminatedString { line, col }),
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_provider_skeleton() {
        let src = r#"syntax "next-router/0.1";
provider "openai" {
  defaults {
    upstream_config { base_url = "https://api.openai.com"; }
  }
}
"#;
        let toks = tokenize(src).unwrap();
        assert!(toks.iter().any(|t| t.kind == TokenKind::Ident && t.text == "provider"));
        assert!(toks.iter().any(|t| t.kind == TokenKind::String && t.text == "https://api.openai.com"));
    }

    #[test]
    fn all_three_comment_styles_are_skipped() {
        let src = "# hash\n// slash\n/* block */\nident;";
        let toks = tokenize(src).unwrap();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].text, "ident");
    }

    #[test]
    fn dollar_var_is_one_token() {
        let toks = tokenize("$channel.key;").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Ident);
        assert_eq!(toks[0].text, "$channel.key");
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(tokenize("\"abc").is_err());
    }
}
