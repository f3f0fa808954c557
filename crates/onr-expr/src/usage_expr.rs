//! Restricted arithmetic grammar used for custom usage extraction:
//! `expr := term (('+' | '-') term)*`, `term := integer | jsonpath`.
//! No parentheses, no precedence beyond left-to-right, no functions.

use serde_json::Value;

use crate::path::{self, ReadPath};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UsageExprError {
    #[error("empty usage expression")]
    Empty,
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error(transparent)]
    Path(#[from] path::PathError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Literal(i64),
    Path(ReadPath),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageExpr {
    terms: Vec<(i64, Term)>,
}

impl UsageExpr {
    pub fn parse(input: &str) -> Result<Self, UsageExprError> {
        let mut rest = input.trim();
        if rest.is_empty() {
            return Err(UsageExprError::Empty);
        }
        let mut terms = Vec::new();
        let mut sign: i64 = 1;
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                return Err(UsageExprError::UnexpectedToken(String::new()));
            }
            let (term, tail) = parse_term(rest)?;
            terms.push((sign, term));
            rest = tail.trim_start();
            if rest.is_empty() {
                break;
            }
            if let Some(tail) = rest.strip_prefix('+') {
                sign = 1;
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix('-') {
                sign = -1;
                rest = tail;
            } else {
                return Err(UsageExprError::UnexpectedToken(rest.to_string()));
            }
        }
        Ok(UsageExpr { terms })
    }

    /// Missing/non-numeric paths contribute 0 to the sum.
    pub fn eval(&self, root: &Value) -> i64 {
        self.terms
            .iter()
            .map(|(sign, term)| sign * term_value(term, root))
            .sum()
    }
}

fn term_value(term: &Term, root: &Value) -> i64 {
    match term {
        Term::Literal(n) => *n,
        Term::Path(p) => {
            let matches = path::eval_read(root, p);
            path::sum_numeric(&matches) as i64
        }
    }
}

fn parse_term(s: &str) -> Result<(Term, &str), UsageExprError> {
    let s = s.trim_start();
    if let Some(after_prefix) = s.strip_prefix('$') {
        let end = after_prefix
            .find(|c: char| c.is_whitespace() || c == '+' || c == '-')
            .map(|i| i + 1)
            .unwrap_or(s.len());
        let token = &s[..end];
        let path = ReadPath::parse(token)?;
        return Ok((Term::Path(path), &s[end..]));
    }
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if end == 0 {
        return Err(UsageExprError::UnexpectedToken(s.to_string()));
    }
    let n: i64 = s[..end]
        .parse()
        .map_err(|_| UsageExprError::UnexpectedToken(s.to_string()))?;
    Ok((Term::Literal(n), &s[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_sum() {
        let e = UsageExpr::parse("5 + 3 - 2").unwrap();
        assert_eq!(e.eval(&json!({})), 6);
    }

    #[test]
    fn wildcard_plus_literal() {
        let e = UsageExpr::parse("$.x.y[*].z + 5").unwrap();
        let root = json!({"x": {"y": [{"z": 3}, {"z": 4}]}});
        assert_eq!(e.eval(&root), 12);
    }

    #[test]
    fn missing_path_is_zero() {
        let e = UsageExpr::parse("$.nope.nothing").unwrap();
        assert_eq!(e.eval(&json!({})), 0);
    }
}
