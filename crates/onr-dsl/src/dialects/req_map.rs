//! `req_map` built-in modes: inbound request normalization between dialects
//! (§4.5).

use serde_json::{Value, json};

use super::common::{chat_part_type_to_responses, flatten_text_content, new_obj, str_field};
use crate::model::ReqMapMode;

pub fn apply(mode: ReqMapMode, body: Value) -> Result<Value, String> {
    match mode {
        ReqMapMode::OpenaiChatToOpenaiResponses => openai_chat_to_openai_responses(body),
        ReqMapMode::AnthropicToOpenaiChat => Ok(anthropic_to_openai_chat(body)),
        ReqMapMode::GeminiToOpenaiChat => Ok(gemini_to_openai_chat(body)),
        ReqMapMode::OpenaiChatToAnthropicMessages => Ok(openai_chat_to_anthropic_messages(body)),
        ReqMapMode::OpenaiChatToGeminiGenerateContent => Ok(openai_chat_to_gemini_generate_content(body)),
    }
}

/// Chat Completions request -> Responses request (§4.5, §8 scenarios 1-2).
/// Passthrough when the body already looks like a Responses request (has
/// `input` and no `messages`).
fn openai_chat_to_openai_responses(body: Value) -> Result<Value, String> {
    if body.get("input").is_some() && body.get("messages").is_none() {
        return Ok(body);
    }
    if let Some(n) = body.get("n").and_then(Value::as_i64) {
        if n > 1 {
            return Err("responses mapping does not support n > 1".to_string());
        }
    }

    let mut out = new_obj();
    if let Some(model) = str_field(&body, "model") {
        out.insert("model".to_string(), json!(model));
    }

    let mut input_items = Vec::new();
    let mut instructions: Option<String> = None;
    // tool_call_id -> call_id, so a later `tool`/`function` message can be
    // turned into a `function_call_output` carrying the original call id.
    let mut call_ids: std::collections::HashMap<String, String> = std::collections::HashMap::new();

    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        for msg in messages {
            let role = str_field(msg, "role").unwrap_or("user");
            match role {
                "system" | "developer" => {
                    let text = flatten_text_content(msg.get("content").unwrap_or(&Value::Null));
                    instructions = Some(match instructions {
                        Some(existing) => format!("{existing}\n{text}"),
                        None => text,
                    });
                }
                "assistant" => {
                    if let Some(content) = msg.get("content") {
                        if !content.is_null() {
                            input_items.push(json!({
                                "role": "assistant",
                                "content": map_content_parts(content),
                            }));
                        }
                    }
                    if let Some(tool_calls) = msg.get("tool_calls").and_then(Value::as_array) {
                        for tc in tool_calls {
                            let id = str_field(tc, "id").unwrap_or_default().to_string();
                            let name = tc.pointer("/function/name").and_then(Value::as_str).unwrap_or_default();
                            let arguments = tc.pointer("/function/arguments").and_then(Value::as_str).unwrap_or("{}");
                            call_ids.insert(id.clone(), id.clone());
                            input_items.push(json!({
                                "type": "function_call",
                                "call_id": id,
                                "name": name,
                                "arguments": arguments,
                            }));
                        }
                    }
                }
                "tool" | "function" => {
                    let call_id = str_field(msg, "tool_call_id")
                        .or_else(|| str_field(msg, "name"))
                        .unwrap_or_default()
                        .to_string();
                    let output = flatten_text_content(msg.get("content").unwrap_or(&Value::Null));
                    input_items.push(json!({
                        "type": "function_call_output",
                        "call_id": call_ids.get(&call_id).cloned().unwrap_or(call_id),
                        "output": output,
                    }));
                }
                _ => {
                    input_items.push(json!({
                        "role": role,
                        "content": map_content_parts(msg.get("content").unwrap_or(&Value::Null)),
                    }));
                }
            }
        }
    }

    out.insert("input".to_string(), Value::Array(input_items));
    if let Some(instr) = instructions {
        out.insert("instructions".to_string(), json!(instr));
    }

    let max_tokens = body.get("max_tokens").and_then(Value::as_i64);
    let max_completion_tokens = body.get("max_completion_tokens").and_then(Value::as_i64);
    if let Some(max) = max_tokens.into_iter().chain(max_completion_tokens).max() {
        out.insert("max_output_tokens".to_string(), json!(max));
    }

    if let Some(tools) = body.get("tools") {
        out.insert("tools".to_string(), map_tools_to_responses(tools));
    }
    if let Some(tool_choice) = body.get("tool_choice") {
        out.insert("tool_choice".to_string(), tool_choice.clone());
    }
    if let Some(response_format) = body.get("response_format") {
        out.insert("text".to_string(), json!({ "format": response_format }));
    }
    for passthrough in ["temperature", "top_p", "stream", "metadata", "user"] {
        if let Some(v) = body.get(passthrough) {
            out.insert(passthrough.to_string(), v.clone());
        }
    }

    Ok(Value::Object(out))
}

fn map_content_parts(content: &Value) -> Value {
    match content {
        Value::Array(parts) => Value::Array(
            parts
                .iter()
                .map(|p| {
                    let Some(part_type) = str_field(p, "type") else { return p.clone() };
                    let mut mapped = p.clone();
                    if let Some(obj) = mapped.as_object_mut() {
                        obj.insert("type".to_string(), json!(chat_part_type_to_responses(part_type)));
                    }
                    mapped
                })
                .collect(),
        ),
        // A bare string stays a string (§8 scenario 1: `input[0].content == "U"`).
        Value::String(_) => content.clone(),
        other => other.clone(),
    }
}

fn map_tools_to_responses(tools: &Value) -> Value {
    let Some(arr) = tools.as_array() else { return tools.clone() };
    Value::Array(
        arr.iter()
            .map(|t| {
                if str_field(t, "type") == Some("function") {
                    if let Some(func) = t.get("function") {
                        let mut merged = func.clone();
                        if let Some(obj) = merged.as_object_mut() {
                            obj.insert("type".to_string(), json!("function"));
                        }
                        return merged;
                    }
                }
                t.clone()
            })
            .collect(),
    )
}

/// Anthropic Messages request -> OpenAI Chat Completions request.
fn anthropic_to_openai_chat(body: Value) -> Value {
    let mut out = new_obj();
    if let Some(model) = str_field(&body, "model") {
        out.insert("model".to_string(), json!(model));
    }
    if let Some(max_tokens) = body.get("max_tokens") {
        out.insert("max_tokens".to_string(), max_tokens.clone());
    }
    if let Some(temp) = body.get("temperature") {
        out.insert("temperature".to_string(), temp.clone());
    }
    if let Some(stream) = body.get("stream") {
        out.insert("stream".to_string(), stream.clone());
    }

    let mut messages = Vec::new();
    if let Some(system) = body.get("system") {
        let text = flatten_text_content(system);
        if !text.is_empty() {
            messages.push(json!({ "role": "system", "content": text }));
        }
    }
    if let Some(anthropic_messages) = body.get("messages").and_then(Value::as_array) {
        for msg in anthropic_messages {
            let role = str_field(msg, "role").unwrap_or("user");
            let content = msg.get("content").cloned().unwrap_or(Value::Null);
            messages.push(json!({ "role": role, "content": anthropic_content_to_chat(&content) }));
        }
    }
    out.insert("messages".to_string(), Value::Array(messages));

    if let Some(tools) = body.get("tools").and_then(Value::as_array) {
        let mapped: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": str_field(t, "name").unwrap_or_default(),
                        "description": str_field(t, "description").unwrap_or_default(),
                        "parameters": t.get("input_schema").cloned().unwrap_or(json!({})),
                    }
                })
            })
            .collect();
        out.insert("tools".to_string(), Value::Array(mapped));
    }

    Value::Object(out)
}

fn anthropic_content_to_chat(content: &Value) -> Value {
    match content {
        Value::String(_) => content.clone(),
        Value::Array(blocks) => {
            let text: String = blocks
                .iter()
                .filter(|b| str_field(b, "type") == Some("text"))
                .filter_map(|b| str_field(b, "text"))
                .collect::<Vec<_>>()
                .join("");
            json!(text)
        }
        other => other.clone(),
    }
}

/// Gemini generateContent request -> OpenAI Chat Completions request.
fn gemini_to_openai_chat(body: Value) -> Value {
    let mut out = new_obj();
    if let Some(model) = str_field(&body, "model") {
        out.insert("model".to_string(), json!(model));
    }
    if let Some(gen_cfg) = body.get("generationConfig") {
        if let Some(max) = gen_cfg.get("maxOutputTokens") {
            out.insert("max_tokens".to_string(), max.clone());
        }
        if let Some(temp) = gen_cfg.get("temperature") {
            out.insert("temperature".to_string(), temp.clone());
        }
    }

    let mut messages = Vec::new();
    if let Some(instr) = body.get("systemInstruction") {
        let text = gemini_parts_text(instr);
        if !text.is_empty() {
            messages.push(json!({ "role": "system", "content": text }));
        }
    }
    if let Some(contents) = body.get("contents").and_then(Value::as_array) {
        for c in contents {
            let role = match str_field(c, "role") {
                Some("model") => "assistant",
                Some(other) => other,
                None => "user",
            };
            messages.push(json!({ "role": role, "content": gemini_parts_text(c) }));
        }
    }
    out.insert("messages".to_string(), Value::Array(messages));
    Value::Object(out)
}

fn gemini_parts_text(content: &Value) -> String {
    content
        .get("parts")
        .and_then(Value::as_array)
        .map(|parts| parts.iter().filter_map(|p| str_field(p, "text")).collect::<Vec<_>>().join(""))
        .unwrap_or_default()
}

/// OpenAI Chat Completions request -> Anthropic Messages request.
fn openai_chat_to_anthropic_messages(body: Value) -> Value {
    let mut out = new_obj();
    if let Some(model) = str_field(&body, "model") {
        out.insert("model".to_string(), json!(model));
    }
    out.insert(
        "max_tokens".to_string(),
        body.get("max_tokens").or_else(|| body.get("max_completion_tokens")).cloned().unwrap_or(json!(4096)),
    );
    if let Some(temp) = body.get("temperature") {
        out.insert("temperature".to_string(), temp.clone());
    }
    if let Some(stream) = body.get("stream") {
        out.insert("stream".to_string(), stream.clone());
    }

    let mut system_parts = Vec::new();
    let mut messages = Vec::new();
    if let Some(chat_messages) = body.get("messages").and_then(Value::as_array) {
        for msg in chat_messages {
            let role = str_field(msg, "role").unwrap_or("user");
            if role == "system" || role == "developer" {
                system_parts.push(flatten_text_content(msg.get("content").unwrap_or(&Value::Null)));
                continue;
            }
            let anthropic_role = if role == "assistant" { "assistant" } else { "user" };
            messages.push(json!({
                "role": anthropic_role,
                "content": flatten_text_content(msg.get("content").unwrap_or(&Value::Null)),
            }));
        }
    }
    if !system_parts.is_empty() {
        out.insert("system".to_string(), json!(system_parts.join("\n")));
    }
    out.insert("messages".to_string(), Value::Array(messages));

    if let Some(tools) = body.get("tools").and_then(Value::as_array) {
        let mapped: Vec<Value> = tools
            .iter()
            .map(|t| {
                let func = t.get("function").cloned().unwrap_or(json!({}));
                json!({
                    "name": str_field(&func, "name").unwrap_or_default(),
                    "description": str_field(&func, "description").unwrap_or_default(),
                    "input_schema": func.get("parameters").cloned().unwrap_or(json!({"type": "object", "properties": {}})),
                })
            })
            .collect();
        out.insert("tools".to_string(), Value::Array(mapped));
    }

    Value::Object(out)
}

/// OpenAI Chat Completions request -> Gemini generateContent request.
fn openai_chat_to_gemini_generate_content(body: Value) -> Value {
    let mut out = new_obj();
    let mut contents = Vec::new();
    let mut system_parts: Vec<Value> = Vec::new();

    if let Some(chat_messages) = body.get("messages").and_then(Value::as_array) {
        for msg in chat_messages {
            let role = str_field(msg, "role").unwrap_or("user");
            let text = flatten_text_content(msg.get("content").unwrap_or(&Value::Null));
            if role == "system" || role == "developer" {
                system_parts.push(json!({ "text": text }));
                continue;
            }
            let gemini_role = if role == "assistant" { "model" } else { "user" };
            contents.push(json!({ "role": gemini_role, "parts": [{ "text": text }] }));
        }
    }
    if !system_parts.is_empty() {
        out.insert("systemInstruction".to_string(), json!({ "parts": system_parts }));
    }
    out.insert("contents".to_string(), Value::Array(contents));

    let mut gen_cfg = new_obj();
    if let Some(max) = body.get("max_tokens").or_else(|| body.get("max_completion_tokens")) {
        gen_cfg.insert("maxOutputTokens".to_string(), max.clone());
    }
    if let Some(temp) = body.get("temperature") {
        gen_cfg.insert("temperature".to_string(), temp.clone());
    }
    if !gen_cfg.is_empty() {
        out.insert("generationConfig".to_string(), Value::Object(gen_cfg));
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_to_responses_system_and_user() {
        let body = json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "S"},
                {"role": "user", "content": "U"}
            ],
            "max_tokens": 123
        });
        let out = openai_chat_to_openai_responses(body).unwrap();
        assert_eq!(out["instructions"], json!("S"));
        assert_eq!(out["input"][0], json!({"role": "user", "content": "U"}));
        assert_eq!(out["max_output_tokens"], json!(123));
    }

    #[test]
    fn chat_to_responses_tool_call_round_trip() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "user", "content": "weather?"},
                {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{}"}
                    }]
                },
                {"role": "tool", "tool_call_id": "call_1", "content": "{\"temp\":20}"}
            ]
        });
        let out = openai_chat_to_openai_responses(body).unwrap();
        let input = out["input"].as_array().unwrap();
        assert_eq!(input.len(), 3);
        assert_eq!(input[1]["type"], json!("function_call"));
        assert_eq!(input[1]["call_id"], json!("call_1"));
        assert_eq!(input[2]["type"], json!("function_call_output"));
        assert_eq!(input[2]["call_id"], json!("call_1"));
        assert_eq!(input[2]["output"], json!("{\"temp\":20}"));
    }

    #[test]
    fn chat_to_responses_rejects_n_greater_than_one() {
        let body = json!({"model": "gpt-4o", "messages": [], "n": 2});
        assert!(openai_chat_to_openai_responses(body).is_err());
    }

    #[test]
    fn chat_to_responses_passthrough_when_already_responses_shaped() {
        let body = json!({"model": "gpt-4o", "input": [{"role": "user", "content": "hi"}]});
        let out = openai_chat_to_openai_responses(body.clone()).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn anthropic_to_chat_flattens_system_and_blocks() {
        let body = json!({
            "model": "claude-3",
            "max_tokens": 100,
            "system": "be terse",
            "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}]
        });
        let out = anthropic_to_openai_chat(body);
        assert_eq!(out["messages"][0]["content"], json!("be terse"));
        assert_eq!(out["messages"][1]["content"], json!("hi"));
    }

    #[test]
    fn chat_to_anthropic_moves_system_out_of_messages() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [{"role": "system", "content": "be terse"}, {"role": "user", "content": "hi"}]
        });
        let out = openai_chat_to_anthropic_messages(body);
        assert_eq!(out["system"], json!("be terse"));
        assert_eq!(out["messages"].as_array().unwrap().len(), 1);
    }
}
