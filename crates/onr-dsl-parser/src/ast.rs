//! The raw, pre-semantic parse tree. `onr-dsl` walks this into typed,
//! validated `ProviderFile`s; this crate only knows grammar, not meaning.

use std::collections::HashMap;

use crate::lexer::Token;

#[derive(Debug, Clone)]
pub struct RawDocument {
    pub syntax: Option<String>,
    pub providers: Vec<RawProvider>,
}

#[derive(Debug, Clone)]
pub struct RawProvider {
    pub name: String,
    pub name_line: u32,
    pub name_col: u32,
    pub defaults: RawBlock,
    pub matches: Vec<RawMatchBlock>,
}

#[derive(Debug, Clone)]
pub struct RawMatchBlock {
    pub api: String,
    pub stream: Option<bool>,
    pub block: RawBlock,
    pub line: u32,
    pub col: u32,
}

/// A `defaults { ... }` or `match { ... }` body: phase name -> statements
/// declared directly inside that phase's nested block.
#[derive(Debug, Clone, Default)]
pub struct RawBlock {
    pub phases: HashMap<String, Vec<RawStatement>>,
}

#[derive(Debug, Clone)]
pub struct RawStatement {
    pub name: String,
    pub args: Vec<Token>,
    pub line: u32,
    pub col: u32,
}

impl RawStatement {
    pub fn arg_strings(&self) -> Vec<&str> {
        self.args.iter().map(|t| t.text.as_str()).collect()
    }
}
