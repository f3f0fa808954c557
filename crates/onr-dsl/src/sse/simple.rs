//! The four remaining `sse_parse` directions (§4.8): event-keyed dispatch,
//! simpler than the Responses->Chat direction because each source dialect
//! already emits one JSON object per logical delta rather than Responses'
//! multi-phase `output_item`/`function_call_arguments` event split.

use serde_json::{Value, json};

use super::{SseEvent, SseTranslator, done_event};

fn text_delta_chunk(role_sent: &mut bool, text: &str) -> Value {
    let mut delta = json!({"content": text});
    if !*role_sent {
        delta["role"] = json!("assistant");
        *role_sent = true;
    }
    json!({"object": "chat.completion.chunk", "choices": [{"index": 0, "delta": delta, "finish_reason": Value::Null}]})
}

fn final_chat_chunk(finish_reason: &str) -> Value {
    json!({"object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {}, "finish_reason": finish_reason}]})
}

/// Anthropic Messages streaming -> OpenAI Chat Completions chunks.
#[derive(Debug, Default)]
pub struct AnthropicToOpenAIChat {
    role_sent: bool,
    saw_tool_use: bool,
    finished: bool,
}

impl SseTranslator for AnthropicToOpenAIChat {
    fn on_event(&mut self, event: SseEvent) -> Vec<SseEvent> {
        if event.is_done() {
            return Vec::new();
        }
        let Ok(value) = serde_json::from_str::<Value>(&event.data) else { return Vec::new() };
        match event.event.as_deref().or_else(|| value.get("type").and_then(Value::as_str)) {
            Some("content_block_delta") => {
                if let Some(text) = value.pointer("/delta/text").and_then(Value::as_str) {
                    return vec![SseEvent::data(text_delta_chunk(&mut self.role_sent, text).to_string())];
                }
                if value.pointer("/delta/type").and_then(Value::as_str) == Some("input_json_delta") {
                    self.saw_tool_use = true;
                }
                Vec::new()
            }
            Some("content_block_start") => {
                if value.pointer("/content_block/type").and_then(Value::as_str) == Some("tool_use") {
                    self.saw_tool_use = true;
                }
                Vec::new()
            }
            Some("message_delta") | Some("message_stop") => {
                if self.finished {
                    return Vec::new();
                }
                self.finished = true;
                let stop_reason = value.pointer("/delta/stop_reason").and_then(Value::as_str);
                let finish_reason = match stop_reason {
                    Some("tool_use") => "tool_calls",
                    Some("max_tokens") => "length",
                    _ if self.saw_tool_use => "tool_calls",
                    _ => "stop",
                };
                vec![SseEvent::data(final_chat_chunk(finish_reason).to_string()), done_event()]
            }
            _ => Vec::new(),
        }
    }

    fn on_eof(&mut self) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![SseEvent::data(final_chat_chunk("stop").to_string()), done_event()]
    }
}

/// Gemini generateContent streaming -> OpenAI Chat Completions chunks.
#[derive(Debug, Default)]
pub struct GeminiToOpenAIChat {
    role_sent: bool,
    finished: bool,
}

impl SseTranslator for GeminiToOpenAIChat {
    fn on_event(&mut self, event: SseEvent) -> Vec<SseEvent> {
        if event.is_done() {
            return Vec::new();
        }
        let Ok(value) = serde_json::from_str::<Value>(&event.data) else { return Vec::new() };
        let candidate = value.get("candidates").and_then(Value::as_array).and_then(|c| c.first());
        let Some(candidate) = candidate else { return Vec::new() };

        let mut out = Vec::new();
        if let Some(parts) = candidate.pointer("/content/parts").and_then(Value::as_array) {
            let text: String = parts.iter().filter_map(|p| p.get("text").and_then(Value::as_str)).collect();
            if !text.is_empty() {
                out.push(SseEvent::data(text_delta_chunk(&mut self.role_sent, &text).to_string()));
            }
        }

        if let Some(finish) = candidate.get("finishReason").and_then(Value::as_str) {
            if !self.finished {
                self.finished = true;
                let finish_reason = match finish {
                    "MAX_TOKENS" => "length",
                    _ => "stop",
                };
                out.push(SseEvent::data(final_chat_chunk(finish_reason).to_string()));
                out.push(done_event());
            }
        }
        out
    }

    fn on_eof(&mut self) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![SseEvent::data(final_chat_chunk("stop").to_string()), done_event()]
    }
}

/// OpenAI Chat Completions streaming -> Anthropic Messages streaming events.
#[derive(Debug, Default)]
pub struct OpenAIChatToAnthropic {
    started: bool,
    finished: bool,
}

impl SseTranslator for OpenAIChatToAnthropic {
    fn on_event(&mut self, event: SseEvent) -> Vec<SseEvent> {
        if event.is_done() {
            return Vec::new();
        }
        let Ok(value) = serde_json::from_str::<Value>(&event.data) else { return Vec::new() };
        let choice = value.get("choices").and_then(Value::as_array).and_then(|c| c.first());
        let Some(choice) = choice else { return Vec::new() };

        let mut out = Vec::new();
        if !self.started {
            self.started = true;
            out.push(SseEvent {
                event: Some("message_start".to_string()),
                data: json!({"type": "message_start", "message": {"role": "assistant", "content": []}}).to_string(),
            });
        }

        if let Some(text) = choice.pointer("/delta/content").and_then(Value::as_str) {
            out.push(SseEvent {
                event: Some("content_block_delta".to_string()),
                data: json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}}).to_string(),
            });
        }

        if let Some(finish_reason) = choice.get("finish_reason").and_then(Value::as_str) {
            if !self.finished {
                self.finished = true;
                let stop_reason = match finish_reason {
                    "tool_calls" => "tool_use",
                    "length" => "max_tokens",
                    _ => "end_turn",
                };
                out.push(SseEvent {
                    event: Some("message_delta".to_string()),
                    data: json!({"type": "message_delta", "delta": {"stop_reason": stop_reason}}).to_string(),
                });
                out.push(done_event());
            }
        }
        out
    }

    fn on_eof(&mut self) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![
            SseEvent {
                event: Some("message_delta".to_string()),
                data: json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}).to_string(),
            },
            done_event(),
        ]
    }
}

/// OpenAI Chat Completions streaming -> Gemini generateContent streaming.
#[derive(Debug, Default)]
pub struct OpenAIChatToGemini {
    finished: bool,
}

impl SseTranslator for OpenAIChatToGemini {
    fn on_event(&mut self, event: SseEvent) -> Vec<SseEvent> {
        if event.is_done() {
            return Vec::new();
        }
        let Ok(value) = serde_json::from_str::<Value>(&event.data) else { return Vec::new() };
        let choice = value.get("choices").and_then(Value::as_array).and_then(|c| c.first());
        let Some(choice) = choice else { return Vec::new() };

        let mut out = Vec::new();
        if let Some(text) = choice.pointer("/delta/content").and_then(Value::as_str) {
            out.push(SseEvent::data(
                json!({
                    "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}, "index": 0}]
                })
                .to_string(),
            ));
        }

        if let Some(finish_reason) = choice.get("finish_reason").and_then(Value::as_str) {
            if !self.finished {
                self.finished = true;
                let gemini_finish = match finish_reason {
                    "length" => "MAX_TOKENS",
                    _ => "STOP",
                };
                out.push(SseEvent::data(
                    json!({"candidates": [{"content": {"role": "model", "parts": []}, "finishReason": gemini_finish, "index": 0}]}).to_string(),
                ));
                out.push(done_event());
            }
        }
        out
    }

    fn on_eof(&mut self) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![
            SseEvent::data(json!({"candidates": [{"content": {"role": "model", "parts": []}, "finishReason": "STOP", "index": 0}]}).to_string()),
            done_event(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_text_delta_maps_to_chat_chunk() {
        let mut t = AnthropicToOpenAIChat::default();
        let out = t.on_event(SseEvent {
            event: Some("content_block_delta".to_string()),
            data: json!({"delta": {"type": "text_delta", "text": "hi"}}).to_string(),
        });
        let chunk: Value = serde_json::from_str(&out[0].data).unwrap();
        assert_eq!(chunk["choices"][0]["delta"]["content"], json!("hi"));
    }

    #[test]
    fn gemini_finish_reason_emits_done_once() {
        let mut t = GeminiToOpenAIChat::default();
        let event = SseEvent::data(json!({"candidates": [{"content": {"parts": [{"text": "hi"}]}, "finishReason": "STOP"}]}).to_string());
        let out = t.on_event(event.clone());
        assert!(out.iter().any(|e| e.is_done()));
        let out2 = t.on_event(event);
        assert!(out2.is_empty());
    }

    #[test]
    fn chat_to_anthropic_maps_tool_calls_finish_reason() {
        let mut t = OpenAIChatToAnthropic::default();
        let out = t.on_event(SseEvent::data(json!({"choices": [{"finish_reason": "tool_calls", "delta": {}}]}).to_string()));
        let last = out.iter().rev().nth(1).unwrap();
        let v: Value = serde_json::from_str(&last.data).unwrap();
        assert_eq!(v["delta"]["stop_reason"], json!("tool_use"));
    }
}
