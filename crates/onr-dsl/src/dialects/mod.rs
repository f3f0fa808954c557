//! Built-in cross-dialect body mappers (§4.5, §4.7): pure `Value -> Value`
//! functions the `req_map`/`resp_map` directives select by name. These are
//! the "hard engineering" the DSL can't express declaratively -- full
//! message/tool-call/content-part reshaping between OpenAI Chat
//! Completions, OpenAI Responses, Anthropic Messages, and Gemini
//! generateContent.

pub mod common;
pub mod req_map;
pub mod resp_map;
