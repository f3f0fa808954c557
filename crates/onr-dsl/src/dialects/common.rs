//! Shared helpers for the body mappers: object/array access shorthands and
//! the multimodal content-part name mapping used by several directions.

use serde_json::{Map, Value};

pub fn obj(v: &Value) -> Option<&Map<String, Value>> {
    v.as_object()
}

pub fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

pub fn new_obj() -> Map<String, Value> {
    Map::new()
}

/// Maps an OpenAI Chat multimodal content-part `type` to its Responses
/// `input_*` equivalent (§4.5).
pub fn chat_part_type_to_responses(part_type: &str) -> &'static str {
    match part_type {
        "text" => "input_text",
        "image_url" => "input_image",
        "input_audio" => "input_audio",
        "file" => "input_file",
        "video_url" => "input_video",
        _ => "input_text",
    }
}

/// Best-effort extraction of a flat text string from an OpenAI Chat
/// `content` field, which may be a bare string or an array of parts.
pub fn flatten_text_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| {
                if str_field(p, "type") == Some("text") {
                    str_field(p, "text").map(str::to_string)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}
