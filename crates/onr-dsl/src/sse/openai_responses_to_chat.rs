//! `openai_responses_to_openai_chat_chunks` (§4.8): the one direction the
//! spec calls out in full detail, generalized from this codebase's
//! `OpenAIResponseToChatCompletionStreamState` to operate on
//! `serde_json::Value` event payloads instead of typed DTOs.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::{SseEvent, SseTranslator, done_event};

#[derive(Debug, Default, Clone)]
struct ToolCallState {
    call_id: String,
    name: Option<String>,
    name_emitted: bool,
    arguments_seen: String,
}

#[derive(Debug, Default)]
pub struct OpenAIResponsesToOpenAIChat {
    sent_start: bool,
    saw_text: bool,
    saw_tool_call: bool,
    /// keyed by output index, BTreeMap to preserve emission order by index.
    tool_calls: BTreeMap<i64, ToolCallState>,
    item_id_to_index: std::collections::HashMap<String, i64>,
    finished: bool,
    model: Option<String>,
    response_id: Option<String>,
}

impl OpenAIResponsesToOpenAIChat {
    fn chunk(&mut self, delta: Value) -> SseEvent {
        let leading = if !self.sent_start {
            self.sent_start = true;
            json!({"role": "assistant"})
        } else {
            Value::Null
        };
        let delta = if leading.is_null() {
            delta
        } else {
            merge_objects(leading, delta)
        };
        let payload = json!({
            "id": self.response_id.clone().unwrap_or_default(),
            "object": "chat.completion.chunk",
            "model": self.model.clone().unwrap_or_default(),
            "choices": [{"index": 0, "delta": delta, "finish_reason": Value::Null}],
        });
        SseEvent::data(payload.to_string())
    }

    fn finalize(&mut self) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let finish_reason = if self.saw_tool_call && !self.saw_text { "tool_calls" } else { "stop" };
        let payload = json!({
            "id": self.response_id.clone().unwrap_or_default(),
            "object": "chat.completion.chunk",
            "model": self.model.clone().unwrap_or_default(),
            "choices": [{"index": 0, "delta": {}, "finish_reason": finish_reason}],
        });
        vec![SseEvent::data(payload.to_string()), done_event()]
    }

    fn is_finalization_trigger(event_name: Option<&str>, value: &Value) -> bool {
        if event_name.is_some_and(|n| n.contains("completed")) {
            return true;
        }
        if value.get("response").is_some() {
            return true;
        }
        if value.get("status").and_then(Value::as_str).is_some_and(|s| !s.is_empty()) {
            return true;
        }
        false
    }
}

fn merge_objects(mut a: Value, b: Value) -> Value {
    if let (Some(ao), Some(bo)) = (a.as_object_mut(), b.as_object()) {
        for (k, v) in bo {
            ao.insert(k.clone(), v.clone());
        }
    }
    a
}

impl SseTranslator for OpenAIResponsesToOpenAIChat {
    fn on_event(&mut self, event: SseEvent) -> Vec<SseEvent> {
        if event.is_done() {
            return Vec::new();
        }
        let Ok(value) = serde_json::from_str::<Value>(&event.data) else {
            // Malformed JSON in data: is ignored, stream continues (§4.8).
            return Vec::new();
        };

        if let Some(model) = value.pointer("/response/model").and_then(Value::as_str) {
            self.model = Some(model.to_string());
        }
        if let Some(id) = value.pointer("/response/id").and_then(Value::as_str) {
            self.response_id = Some(id.to_string());
        }

        let event_type = value.get("type").and_then(Value::as_str).unwrap_or_default();

        if event_type == "response.output_text.delta" {
            if let Some(text) = value.get("delta").and_then(Value::as_str) {
                self.saw_text = true;
                return vec![self.chunk(json!({"content": text}))];
            }
            return Vec::new();
        }

        if event_type == "response.output_item.added" || event_type == "response.output_item.done" {
            let item = value.get("item").cloned().unwrap_or(Value::Null);
            if item.get("type").and_then(Value::as_str) == Some("function_call") {
                let index = value.get("output_index").and_then(Value::as_i64).unwrap_or(0);
                let item_id = item.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                let call_id = item.get("call_id").and_then(Value::as_str).unwrap_or(&item_id).to_string();
                let name = item.get("name").and_then(Value::as_str).map(str::to_string);
                let arguments = item.get("arguments").and_then(Value::as_str).unwrap_or_default();

                self.item_id_to_index.insert(item_id, index);
                let state = self.tool_calls.entry(index).or_default();
                if state.call_id.is_empty() {
                    state.call_id = call_id;
                }
                if name.is_some() {
                    state.name = name;
                }

                if self.saw_text {
                    return Vec::new();
                }
                self.saw_tool_call = true;

                let delta_args = arguments.strip_prefix(state.arguments_seen.as_str()).unwrap_or(arguments);
                state.arguments_seen = arguments.to_string();

                let mut tool_call = json!({"index": index, "id": state.call_id});
                let mut function = json!({});
                if !state.name_emitted {
                    if let Some(name) = &state.name {
                        function["name"] = json!(name);
                        state.name_emitted = true;
                    }
                }
                if !delta_args.is_empty() {
                    function["arguments"] = json!(delta_args);
                }
                tool_call["type"] = json!("function");
                tool_call["function"] = function;
                return vec![self.chunk(json!({"tool_calls": [tool_call]}))];
            }
            return Vec::new();
        }

        if event_type == "response.function_call_arguments.delta" {
            if self.saw_text {
                return Vec::new();
            }
            let item_id = value.get("item_id").and_then(Value::as_str).unwrap_or_default();
            let Some(&index) = self.item_id_to_index.get(item_id) else { return Vec::new() };
            let delta_args = value.get("delta").and_then(Value::as_str).unwrap_or_default();
            self.saw_tool_call = true;
            let state = self.tool_calls.entry(index).or_default();
            state.arguments_seen.push_str(delta_args);

            let mut tool_call = json!({"index": index, "id": state.call_id, "type": "function"});
            let mut function = json!({});
            if !state.name_emitted {
                if let Some(name) = &state.name {
                    function["name"] = json!(name);
                    state.name_emitted = true;
                }
            }
            function["arguments"] = json!(delta_args);
            tool_call["function"] = function;
            return vec![self.chunk(json!({"tool_calls": [tool_call]}))];
        }

        if Self::is_finalization_trigger(event.event.as_deref(), &value) {
            // Defer the terminal chunk + [DONE] to on_eof instead of
            // emitting it here: some upstreams send `response.completed`
            // before trailing content deltas, and content must still precede
            // the lone [DONE] in the output (late-completed ordering
            // invariant, §4.8 invariant ii). on_eof finalizes unconditionally
            // so a stream that never repeats the trigger still terminates.
            return Vec::new();
        }

        Vec::new()
    }

    fn on_eof(&mut self) -> Vec<SseEvent> {
        self.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(v: Value) -> SseEvent {
        SseEvent::data(v.to_string())
    }

    #[test]
    fn text_delta_produces_content_chunk() {
        let mut t = OpenAIResponsesToOpenAIChat::default();
        let out = t.on_event(data(json!({"type": "response.output_text.delta", "delta": "hi"})));
        assert_eq!(out.len(), 1);
        let chunk: Value = serde_json::from_str(&out[0].data).unwrap();
        assert_eq!(chunk["choices"][0]["delta"]["content"], json!("hi"));
        assert_eq!(chunk["choices"][0]["delta"]["role"], json!("assistant"));
    }

    #[test]
    fn duplicate_completed_events_emit_done_once() {
        let mut t = OpenAIResponsesToOpenAIChat::default();
        let first = t.on_event(SseEvent { event: Some("response.completed".to_string()), data: json!({}).to_string() });
        let second = t.on_event(SseEvent { event: Some("response.completed".to_string()), data: json!({}).to_string() });
        assert!(first.is_empty());
        assert!(second.is_empty());
        let done_count = |events: &[SseEvent]| events.iter().filter(|e| e.is_done()).count();
        let eof = t.on_eof();
        assert_eq!(done_count(&eof), 1);
        assert!(t.on_eof().is_empty());
    }

    #[test]
    fn completed_before_content_delta_defers_done_past_the_content() {
        let mut t = OpenAIResponsesToOpenAIChat::default();
        let during = t.on_event(SseEvent { event: Some("response.completed".to_string()), data: json!({}).to_string() });
        assert!(during.is_empty(), "completion must not emit [DONE] before trailing content");
        let delta = t.on_event(data(json!({"type": "response.output_text.delta", "delta": "Hello"})));
        assert_eq!(delta.len(), 1);
        assert!(!delta[0].is_done());
        let chunk: Value = serde_json::from_str(&delta[0].data).unwrap();
        assert_eq!(chunk["choices"][0]["delta"]["content"], json!("Hello"));
        let eof = t.on_eof();
        assert_eq!(eof.len(), 2);
        assert!(eof.last().unwrap().is_done());
    }

    #[test]
    fn eof_without_completion_event_still_finalizes() {
        let mut t = OpenAIResponsesToOpenAIChat::default();
        t.on_event(data(json!({"type": "response.output_text.delta", "delta": "partial"})));
        let out = t.on_eof();
        assert!(out.iter().any(|e| e.is_done()));
    }

    #[test]
    fn tool_call_arguments_delta_is_suffix_of_previous() {
        let mut t = OpenAIResponsesToOpenAIChat::default();
        t.on_event(data(json!({
            "type": "response.output_item.added",
            "output_index": 0,
            "item": {"type": "function_call", "id": "item_1", "call_id": "call_1", "name": "get_weather", "arguments": "{\"city\":"}
        })));
        let out = t.on_event(data(json!({
            "type": "response.output_item.done",
            "output_index": 0,
            "item": {"type": "function_call", "id": "item_1", "call_id": "call_1", "name": "get_weather", "arguments": "{\"city\":\"NYC\"}"}
        })));
        let chunk: Value = serde_json::from_str(&out[0].data).unwrap();
        assert_eq!(chunk["choices"][0]["delta"]["tool_calls"][0]["function"]["arguments"], json!("\"NYC\"}"));
    }

    #[test]
    fn text_suppresses_tool_call_chunks() {
        let mut t = OpenAIResponsesToOpenAIChat::default();
        t.on_event(data(json!({"type": "response.output_text.delta", "delta": "hi"})));
        let out = t.on_event(data(json!({
            "type": "response.output_item.added",
            "output_index": 0,
            "item": {"type": "function_call", "id": "item_1", "call_id": "call_1", "arguments": ""}
        })));
        assert!(out.is_empty());
    }

    #[test]
    fn malformed_json_is_ignored() {
        let mut t = OpenAIResponsesToOpenAIChat::default();
        let out = t.on_event(SseEvent::data("not json"));
        assert!(out.is_empty());
    }
}
