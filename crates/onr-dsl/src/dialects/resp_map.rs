//! `resp_map` built-in modes: non-streaming response body reshaping between
//! dialects (§4.7). The streaming counterparts live in [`crate::sse`].

use serde_json::{Value, json};

use super::common::{new_obj, str_field};
use crate::model::RespMapMode;

pub fn apply(mode: RespMapMode, body: Value) -> Value {
    match mode {
        RespMapMode::OpenaiResponsesToOpenaiChat => openai_responses_to_openai_chat(body),
        RespMapMode::AnthropicToOpenaiChat => anthropic_to_openai_chat(body),
        RespMapMode::GeminiToOpenaiChat => gemini_to_openai_chat(body),
        RespMapMode::OpenaiChatToAnthropicMessages => openai_chat_to_anthropic_messages(body),
        RespMapMode::OpenaiChatToGeminiGenerateContent => openai_chat_to_gemini_generate_content(body),
    }
}

/// Responses response -> Chat Completions response.
fn openai_responses_to_openai_chat(body: Value) -> Value {
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    if let Some(output) = body.get("output").and_then(Value::as_array) {
        for item in output {
            match str_field(item, "type") {
                Some("message") => {
                    if let Some(parts) = item.get("content").and_then(Value::as_array) {
                        for part in parts {
                            if let Some(text) = str_field(part, "text") {
                                content.push_str(text);
                            }
                        }
                    }
                }
                Some("function_call") => {
                    tool_calls.push(json!({
                        "id": str_field(item, "call_id").unwrap_or_default(),
                        "type": "function",
                        "function": {
                            "name": str_field(item, "name").unwrap_or_default(),
                            "arguments": str_field(item, "arguments").unwrap_or("{}"),
                        }
                    }));
                }
                _ => {}
            }
        }
    }

    let mut message = new_obj();
    message.insert("role".to_string(), json!("assistant"));
    message.insert("content".to_string(), if content.is_empty() && !tool_calls.is_empty() { Value::Null } else { json!(content) });
    if !tool_calls.is_empty() {
        message.insert("tool_calls".to_string(), Value::Array(tool_calls));
    }

    let finish_reason = if message.get("tool_calls").is_some() { "tool_calls" } else { "stop" };

    let mut out = new_obj();
    if let Some(id) = str_field(&body, "id") {
        out.insert("id".to_string(), json!(id));
    }
    out.insert("object".to_string(), json!("chat.completion"));
    if let Some(model) = str_field(&body, "model") {
        out.insert("model".to_string(), json!(model));
    }
    out.insert(
        "choices".to_string(),
        json!([{ "index": 0, "message": Value::Object(message), "finish_reason": finish_reason }]),
    );
    if let Some(usage) = body.get("usage") {
        out.insert(
            "usage".to_string(),
            json!({
                "prompt_tokens": usage.get("input_tokens").cloned().unwrap_or(json!(0)),
                "completion_tokens": usage.get("output_tokens").cloned().unwrap_or(json!(0)),
                "total_tokens": usage.get("total_tokens").cloned().unwrap_or(json!(0)),
            }),
        );
    }

    Value::Object(out)
}

/// Anthropic Messages response -> Chat Completions response.
fn anthropic_to_openai_chat(body: Value) -> Value {
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    if let Some(blocks) = body.get("content").and_then(Value::as_array) {
        for block in blocks {
            match str_field(block, "type") {
                Some("text") => {
                    if let Some(t) = str_field(block, "text") {
                        content.push_str(t);
                    }
                }
                Some("tool_use") => {
                    tool_calls.push(json!({
                        "id": str_field(block, "id").unwrap_or_default(),
                        "type": "function",
                        "function": {
                            "name": str_field(block, "name").unwrap_or_default(),
                            "arguments": block.get("input").cloned().unwrap_or(json!({})).to_string(),
                        }
                    }));
                }
                _ => {}
            }
        }
    }

    let finish_reason = match str_field(&body, "stop_reason") {
        Some("end_turn") => "stop",
        Some("max_tokens") => "length",
        Some("tool_use") => "tool_calls",
        Some(other) => other,
        None => "stop",
    };

    let mut message = new_obj();
    message.insert("role".to_string(), json!("assistant"));
    message.insert("content".to_string(), if content.is_empty() && !tool_calls.is_empty() { Value::Null } else { json!(content) });
    if !tool_calls.is_empty() {
        message.insert("tool_calls".to_string(), Value::Array(tool_calls));
    }

    let mut out = new_obj();
    if let Some(id) = str_field(&body, "id") {
        out.insert("id".to_string(), json!(id));
    }
    out.insert("object".to_string(), json!("chat.completion"));
    if let Some(model) = str_field(&body, "model") {
        out.insert("model".to_string(), json!(model));
    }
    out.insert(
        "choices".to_string(),
        json!([{ "index": 0, "message": Value::Object(message), "finish_reason": finish_reason }]),
    );
    if let Some(usage) = body.get("usage") {
        let input = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
        let output = usage.get("output_tokens").and_then(Value::as_i64).unwrap_or(0);
        out.insert(
            "usage".to_string(),
            json!({ "prompt_tokens": input, "completion_tokens": output, "total_tokens": input + output }),
        );
    }

    Value::Object(out)
}

/// Gemini generateContent response -> Chat Completions response.
fn gemini_to_openai_chat(body: Value) -> Value {
    let mut content = String::new();
    let mut finish_reason = "stop";
    if let Some(candidates) = body.get("candidates").and_then(Value::as_array) {
        if let Some(first) = candidates.first() {
            if let Some(parts) = first.pointer("/content/parts").and_then(Value::as_array) {
                for part in parts {
                    if let Some(text) = str_field(part, "text") {
                        content.push_str(text);
                    }
                }
            }
            finish_reason = match str_field(first, "finishReason") {
                Some("STOP") => "stop",
                Some("MAX_TOKENS") => "length",
                Some(_) => "stop",
                None => "stop",
            };
        }
    }

    let mut out = new_obj();
    out.insert("object".to_string(), json!("chat.completion"));
    out.insert(
        "choices".to_string(),
        json!([{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": finish_reason,
        }]),
    );
    if let Some(usage) = body.get("usageMetadata") {
        out.insert(
            "usage".to_string(),
            json!({
                "prompt_tokens": usage.get("promptTokenCount").cloned().unwrap_or(json!(0)),
                "completion_tokens": usage.get("candidatesTokenCount").cloned().unwrap_or(json!(0)),
                "total_tokens": usage.get("totalTokenCount").cloned().unwrap_or(json!(0)),
            }),
        );
    }

    Value::Object(out)
}

/// Chat Completions response -> Anthropic Messages response.
fn openai_chat_to_anthropic_messages(body: Value) -> Value {
    let choice = body.get("choices").and_then(Value::as_array).and_then(|c| c.first());
    let mut blocks = Vec::new();
    let mut stop_reason = "end_turn";

    if let Some(choice) = choice {
        if let Some(message) = choice.get("message") {
            if let Some(text) = str_field(message, "content") {
                if !text.is_empty() {
                    blocks.push(json!({ "type": "text", "text": text }));
                }
            }
            if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
                for tc in tool_calls {
                    let args_str = tc.pointer("/function/arguments").and_then(Value::as_str).unwrap_or("{}");
                    let input: Value = serde_json::from_str(args_str).unwrap_or(json!({}));
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": str_field(tc, "id").unwrap_or_default(),
                        "name": tc.pointer("/function/name").and_then(Value::as_str).unwrap_or_default(),
                        "input": input,
                    }));
                }
            }
        }
        stop_reason = match str_field(choice, "finish_reason") {
            Some("stop") => "end_turn",
            Some("length") => "max_tokens",
            Some("tool_calls") => "tool_use",
            Some(other) => other,
            None => "end_turn",
        };
    }

    let mut out = new_obj();
    if let Some(id) = str_field(&body, "id") {
        out.insert("id".to_string(), json!(id));
    }
    out.insert("type".to_string(), json!("message"));
    out.insert("role".to_string(), json!("assistant"));
    out.insert("content".to_string(), Value::Array(blocks));
    out.insert("stop_reason".to_string(), json!(stop_reason));
    if let Some(model) = str_field(&body, "model") {
        out.insert("model".to_string(), json!(model));
    }
    if let Some(usage) = body.get("usage") {
        out.insert(
            "usage".to_string(),
            json!({
                "input_tokens": usage.get("prompt_tokens").cloned().unwrap_or(json!(0)),
                "output_tokens": usage.get("completion_tokens").cloned().unwrap_or(json!(0)),
            }),
        );
    }

    Value::Object(out)
}

/// Chat Completions response -> Gemini generateContent response.
fn openai_chat_to_gemini_generate_content(body: Value) -> Value {
    let choice = body.get("choices").and_then(Value::as_array).and_then(|c| c.first());
    let text = choice.and_then(|c| c.pointer("/message/content")).and_then(Value::as_str).unwrap_or_default();
    let finish_reason = choice.and_then(|c| str_field(c, "finish_reason"));
    let gemini_finish = match finish_reason {
        Some("stop") => "STOP",
        Some("length") => "MAX_TOKENS",
        _ => "STOP",
    };

    let mut out = new_obj();
    out.insert(
        "candidates".to_string(),
        json!([{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": gemini_finish,
            "index": 0,
        }]),
    );
    if let Some(usage) = body.get("usage") {
        out.insert(
            "usageMetadata".to_string(),
            json!({
                "promptTokenCount": usage.get("prompt_tokens").cloned().unwrap_or(json!(0)),
                "candidatesTokenCount": usage.get("completion_tokens").cloned().unwrap_or(json!(0)),
                "totalTokenCount": usage.get("total_tokens").cloned().unwrap_or(json!(0)),
            }),
        );
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn responses_to_chat_extracts_text_and_finish_reason() {
        let body = json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "hi"}]}],
            "usage": {"input_tokens": 3, "output_tokens": 1, "total_tokens": 4}
        });
        let out = openai_responses_to_openai_chat(body);
        assert_eq!(out["choices"][0]["message"]["content"], json!("hi"));
        assert_eq!(out["choices"][0]["finish_reason"], json!("stop"));
        assert_eq!(out["usage"]["total_tokens"], json!(4));
    }

    #[test]
    fn anthropic_tool_use_maps_to_chat_tool_calls() {
        let body = json!({
            "id": "msg_1",
            "model": "claude-3",
            "stop_reason": "tool_use",
            "content": [{"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "NYC"}}]
        });
        let out = anthropic_to_openai_chat(body);
        assert_eq!(out["choices"][0]["finish_reason"], json!("tool_calls"));
        assert_eq!(out["choices"][0]["message"]["tool_calls"][0]["function"]["name"], json!("get_weather"));
    }

    #[test]
    fn chat_to_anthropic_maps_finish_reason_and_tool_use() {
        let body = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{"id": "call_1", "type": "function", "function": {"name": "f", "arguments": "{\"x\":1}"}}]
                }
            }]
        });
        let out = openai_chat_to_anthropic_messages(body);
        assert_eq!(out["stop_reason"], json!("tool_use"));
        assert_eq!(out["content"][0]["type"], json!("tool_use"));
        assert_eq!(out["content"][0]["input"], json!({"x": 1}));
    }
}
