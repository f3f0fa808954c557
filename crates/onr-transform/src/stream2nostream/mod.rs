//! Per-dialect SSE-chunk accumulators used when a downstream caller asked for
//! a non-streaming response but the upstream only speaks streaming (or
//! vice versa is handled by `middleware::stream`).

pub mod claude;
pub mod gemini;
pub mod openai_chat_completions;
pub mod openai_response;
