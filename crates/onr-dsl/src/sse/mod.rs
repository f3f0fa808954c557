//! SSE Transformer (§4.8, §4.8a): a dialect-agnostic line parser feeding
//! per-mode translators, each accumulating just enough state to reshape one
//! event stream into another and finalize exactly once.

mod openai_responses_to_chat;
mod simple;

use serde_json::Value;

use crate::model::{JsonOp, SseJsonDelIf, SseParseMode};

/// One flushed SSE event: an optional `event:` name and the joined `data:`
/// lines (still raw text -- JSON parsing happens per-translator).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn data(data: impl Into<String>) -> Self {
        SseEvent { event: None, data: data.into() }
    }

    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Line parser grounded on this codebase's `SseParser`: buffers partial
/// lines, flushes an event on a blank line, and `finish()` flushes any
/// pending event at EOF even without a trailing blank line (invariant iii).
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line = self.buffer[..pos].to_string();
            self.buffer.drain(..=pos);
            if line.ends_with('\r') {
                line.pop();
            }
            if line.is_empty() {
                self.finish_event(&mut events);
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = line.strip_prefix("event:") {
                let value = value.trim_start();
                self.event = if value.is_empty() { None } else { Some(value.to_string()) };
                continue;
            }
            if let Some(value) = line.strip_prefix("data:") {
                self.data_lines.push(value.trim_start().to_string());
                continue;
            }
        }
        events
    }

    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let mut line = std::mem::take(&mut self.buffer);
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(value) = line.strip_prefix("event:") {
                let value = value.trim_start();
                self.event = if value.is_empty() { None } else { Some(value.to_string()) };
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data_lines.push(value.trim_start().to_string());
            }
        }
        self.finish_event(&mut events);
        events
    }

    fn finish_event(&mut self, events: &mut Vec<SseEvent>) {
        if self.event.is_none() && self.data_lines.is_empty() {
            return;
        }
        let data = self.data_lines.join("\n");
        events.push(SseEvent { event: self.event.take(), data });
        self.data_lines.clear();
    }
}

/// Serializes an `SseEvent` back to wire format.
pub fn render(event: &SseEvent) -> String {
    match &event.event {
        Some(name) => format!("event: {name}\ndata: {}\n\n", event.data),
        None => format!("data: {}\n\n", event.data),
    }
}

pub fn done_event() -> SseEvent {
    SseEvent::data("[DONE]")
}

/// Per-direction translator (§4.8a): `on_event` may emit zero or more output
/// events per input event; `on_eof` finalizes exactly once even if the
/// translator already emitted a terminal chunk from a duplicate completion
/// event.
pub trait SseTranslator: Send {
    fn on_event(&mut self, event: SseEvent) -> Vec<SseEvent>;
    fn on_eof(&mut self) -> Vec<SseEvent>;
}

pub fn translator_for(mode: SseParseMode) -> Box<dyn SseTranslator> {
    match mode {
        SseParseMode::OpenaiResponsesToOpenaiChatChunks => Box::new(openai_responses_to_chat::OpenAIResponsesToOpenAIChat::default()),
        SseParseMode::AnthropicToOpenaiChatChunks => Box::new(simple::AnthropicToOpenAIChat::default()),
        SseParseMode::GeminiToOpenaiChatChunks => Box::new(simple::GeminiToOpenAIChat::default()),
        SseParseMode::OpenaiChatToAnthropicChunks => Box::new(simple::OpenAIChatToAnthropic::default()),
        SseParseMode::OpenaiChatToGeminiChunks => Box::new(simple::OpenAIChatToGemini::default()),
    }
}

/// Declarative `sse_json_del_if`/json-op pass over already-translated output
/// events (§4.8, §4.8a): runs after the built-in translator, never instead
/// of it; `[DONE]` frames and non-JSON-object payloads pass through
/// untouched.
pub fn apply_declarative_ops(events: Vec<SseEvent>, del_ifs: &[SseJsonDelIf], json_ops: &[JsonOp], ctx: &onr_expr::EvalCtx) -> Vec<SseEvent> {
    events
        .into_iter()
        .map(|event| {
            if event.is_done() {
                return event;
            }
            let Ok(mut value) = serde_json::from_str::<Value>(&event.data) else {
                return event;
            };
            if !value.is_object() {
                return event;
            }
            for rule in del_ifs {
                let matches = onr_expr::path::eval_read(&value, &rule.cond_path);
                if matches.iter().any(|v| v.as_str() == Some(rule.equals.as_str())) {
                    let _ = onr_expr::path::del(&mut value, &rule.del_path);
                }
            }
            let eval = |e: &onr_expr::Expr| e.eval(ctx);
            if crate::jsonops::apply_json_ops(&mut value, json_ops, eval).is_err() {
                return SseEvent { event: event.event, data: value.to_string() };
            }
            SseEvent { event: event.event, data: value.to_string() }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_flushes_on_blank_line() {
        let mut parser = SseParser::new();
        let events = parser.push_str("event: foo\ndata: {\"a\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("foo"));
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn parser_finish_flushes_pending_without_trailing_blank_line() {
        let mut parser = SseParser::new();
        assert!(parser.push_str("data: partial").is_empty());
        let events = parser.finish();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn multiline_data_is_joined_with_newline() {
        let mut parser = SseParser::new();
        let events = parser.push_str("data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }
}
