//! Metrics Extractor (§4.9): non-streaming usage/finish-reason extraction by
//! dialect, plus the streaming `StreamMetricsAggregator` that folds parsed
//! `data:` JSON payloads into a final snapshot.

use onr_expr::path;
use serde_json::Value;

use crate::model::{FinishReasonConfig, FinishReasonMode, UsageConfig, UsageDirectives, UsageExtractMode};

/// Extracted usage counters (§3). `None` fields mean "not reported by this
/// response", not zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub cached_tokens: Option<i64>,
    pub cache_write_tokens: Option<i64>,
}

impl Usage {
    /// Latest-positive-per-field merge: an incoming field overwrites the
    /// base only when present, regardless of the base's existing value
    /// (§4.9a -- this is the Anthropic streaming policy).
    pub fn merge_latest_positive(&mut self, incoming: &Usage) {
        if incoming.input_tokens.is_some() {
            self.input_tokens = incoming.input_tokens;
        }
        if incoming.output_tokens.is_some() {
            self.output_tokens = incoming.output_tokens;
        }
        if incoming.total_tokens.is_some() {
            self.total_tokens = incoming.total_tokens;
        }
        if incoming.cached_tokens.is_some() {
            self.cached_tokens = incoming.cached_tokens;
        }
        if incoming.cache_write_tokens.is_some() {
            self.cache_write_tokens = incoming.cache_write_tokens;
        }
    }

    fn is_nonzero(&self) -> bool {
        [self.input_tokens, self.output_tokens, self.total_tokens, self.cached_tokens, self.cache_write_tokens]
            .into_iter()
            .any(|v| v.is_some_and(|n| n != 0))
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64()
}

/// Non-streaming usage extraction, dispatched by the selected mode.
pub fn extract_usage(body: &Value, directives: &UsageDirectives) -> Usage {
    match directives.mode {
        Some(UsageExtractMode::Openai) => extract_openai(body),
        Some(UsageExtractMode::Anthropic) => extract_anthropic(body),
        Some(UsageExtractMode::Gemini) => extract_gemini(body),
        Some(UsageExtractMode::Custom) => extract_custom(body, directives),
        None => Usage::default(),
    }
}

fn extract_openai(body: &Value) -> Usage {
    let usage = body.get("usage");
    let input_tokens = usage
        .and_then(|u| u.get("prompt_tokens").or_else(|| u.get("input_tokens")))
        .and_then(as_i64);
    let output_tokens = usage
        .and_then(|u| u.get("completion_tokens").or_else(|| u.get("output_tokens")))
        .and_then(as_i64);
    let total_tokens = usage.and_then(|u| u.get("total_tokens")).and_then(as_i64);
    let cached_tokens = usage
        .and_then(|u| {
            u.pointer("/prompt_tokens_details/cached_tokens")
                .or_else(|| u.pointer("/input_tokens_details/cached_tokens"))
                .or_else(|| u.get("cached_tokens"))
        })
        .and_then(as_i64);
    Usage { input_tokens, output_tokens, total_tokens, cached_tokens, cache_write_tokens: None }
}

fn extract_anthropic(body: &Value) -> Usage {
    let usage = body.get("usage");
    Usage {
        input_tokens: usage.and_then(|u| u.get("input_tokens")).and_then(as_i64),
        output_tokens: usage.and_then(|u| u.get("output_tokens")).and_then(as_i64),
        total_tokens: None,
        cached_tokens: usage.and_then(|u| u.get("cache_read_input_tokens")).and_then(as_i64),
        cache_write_tokens: usage.and_then(|u| u.get("cache_creation_input_tokens")).and_then(as_i64),
    }
}

fn extract_gemini(body: &Value) -> Usage {
    let usage = body.get("usageMetadata");
    let candidates = usage.and_then(|u| u.get("candidatesTokenCount")).and_then(as_i64);
    let thoughts = usage.and_then(|u| u.get("thoughtsTokenCount")).and_then(as_i64);
    let output_tokens = match (candidates, thoughts) {
        (None, None) => None,
        (c, t) => Some(c.unwrap_or(0) + t.unwrap_or(0)),
    };
    Usage {
        input_tokens: usage.and_then(|u| u.get("promptTokenCount")).and_then(as_i64),
        output_tokens,
        total_tokens: usage.and_then(|u| u.get("totalTokenCount")).and_then(as_i64),
        cached_tokens: None,
        cache_write_tokens: None,
    }
}

fn extract_custom(body: &Value, directives: &UsageDirectives) -> Usage {
    let via_expr_or_path = |expr: &Option<onr_expr::UsageExpr>, path_fallback: &Option<onr_expr::ReadPath>| -> Option<i64> {
        if let Some(e) = expr {
            return Some(e.eval(body));
        }
        path_fallback.as_ref().map(|p| {
            let matches = path::eval_read(body, p);
            path::sum_numeric(&matches) as i64
        })
    };
    Usage {
        input_tokens: via_expr_or_path(&directives.input_tokens, &directives.input_tokens_path),
        output_tokens: via_expr_or_path(&directives.output_tokens, &directives.output_tokens_path),
        total_tokens: directives.total_tokens.as_ref().map(|e| e.eval(body)),
        cached_tokens: directives.cached_tokens.as_ref().map(|e| e.eval(body)),
        cache_write_tokens: directives.cache_write_tokens.as_ref().map(|e| e.eval(body)),
    }
}

/// Non-streaming finish-reason extraction (§4.9). Returns the first matching
/// value, opaque and lowercase-preserved.
pub fn extract_finish_reason(body: &Value, directives: &crate::model::FinishReasonDirectives) -> Option<String> {
    match directives.mode {
        Some(FinishReasonMode::Openai) => body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.get("finish_reason"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(FinishReasonMode::Anthropic) => body
            .get("stop_reason")
            .or_else(|| body.pointer("/delta/stop_reason"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(FinishReasonMode::Gemini) => body
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.get("finishReason"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(FinishReasonMode::Custom) => directives
            .path
            .as_ref()
            .and_then(|p| path::eval_read(body, p).into_iter().find_map(|v| v.as_str()))
            .map(str::to_string),
        None => None,
    }
}

pub fn resolve_usage_directives(config: &UsageConfig, api: crate::meta::Api, is_stream: bool) -> UsageDirectives {
    config.phase.select(api, is_stream).map(|m| m.payload.clone()).unwrap_or_else(|| config.phase.defaults.clone())
}

pub fn resolve_finish_reason_directives(
    config: &FinishReasonConfig,
    api: crate::meta::Api,
    is_stream: bool,
) -> crate::model::FinishReasonDirectives {
    config.phase.select(api, is_stream).map(|m| m.payload.clone()).unwrap_or_else(|| config.phase.defaults.clone())
}

/// Folds a stream of parsed `data:` JSON payloads into a final usage +
/// finish-reason snapshot (§4.9, §4.9a). Finish reason is "first non-empty
/// value seen"; usage merge policy depends on the configured mode.
pub struct StreamMetricsAggregator {
    usage_directives: UsageDirectives,
    finish_directives: crate::model::FinishReasonDirectives,
    usage: Option<Usage>,
    finish_reason: Option<String>,
}

impl StreamMetricsAggregator {
    pub fn new(usage_directives: UsageDirectives, finish_directives: crate::model::FinishReasonDirectives) -> Self {
        StreamMetricsAggregator { usage_directives, finish_directives, usage: None, finish_reason: None }
    }

    pub fn on_sse_data_json(&mut self, value: &Value) {
        if self.finish_reason.is_none() {
            if let Some(reason) = extract_finish_reason(value, &self.finish_directives) {
                if !reason.is_empty() {
                    self.finish_reason = Some(reason);
                }
            }
        }

        let incoming = extract_usage(value, &self.usage_directives);
        if self.usage_directives.mode == Some(UsageExtractMode::Anthropic) {
            self.usage.get_or_insert_with(Usage::default).merge_latest_positive(&incoming);
        } else if incoming.is_nonzero() {
            self.usage = Some(incoming);
        }
    }

    /// `(usage, cached_tokens, finish_reason, ok)`. `ok` is false only when
    /// no usage was ever observed and the mode expected one (host uses this
    /// to decide whether to log a metrics-miss, never to fail the request).
    pub fn result(self) -> (Option<Usage>, Option<i64>, Option<String>, bool) {
        let ok = self.usage.is_some() || self.usage_directives.mode.is_none();
        let cached = self.usage.and_then(|u| u.cached_tokens);
        (self.usage, cached, self.finish_reason, ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_extracts_prompt_and_completion_tokens() {
        let body = json!({"usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}});
        let directives = UsageDirectives { mode: Some(UsageExtractMode::Openai), ..Default::default() };
        let usage = extract_usage(&body, &directives);
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(5));
        assert_eq!(usage.total_tokens, Some(15));
    }

    #[test]
    fn gemini_combines_candidates_and_thoughts() {
        let body = json!({"usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 3, "thoughtsTokenCount": 4}});
        let directives = UsageDirectives { mode: Some(UsageExtractMode::Gemini), ..Default::default() };
        let usage = extract_usage(&body, &directives);
        assert_eq!(usage.output_tokens, Some(7));
    }

    #[test]
    fn anthropic_aggregator_keeps_latest_positive_per_field() {
        let directives = UsageDirectives { mode: Some(UsageExtractMode::Anthropic), ..Default::default() };
        let mut agg = StreamMetricsAggregator::new(directives, Default::default());
        agg.on_sse_data_json(&json!({"usage": {"input_tokens": 10}}));
        agg.on_sse_data_json(&json!({"usage": {"output_tokens": 5}}));
        let (usage, _, _, ok) = agg.result();
        let usage = usage.unwrap();
        assert!(ok);
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(5));
    }

    #[test]
    fn openai_aggregator_keeps_last_nonzero_snapshot() {
        let directives = UsageDirectives { mode: Some(UsageExtractMode::Openai), ..Default::default() };
        let mut agg = StreamMetricsAggregator::new(directives, Default::default());
        agg.on_sse_data_json(&json!({"usage": {"prompt_tokens": 3, "completion_tokens": 1}}));
        agg.on_sse_data_json(&json!({"usage": {"prompt_tokens": 3, "completion_tokens": 2}}));
        let (usage, _, _, _) = agg.result();
        assert_eq!(usage.unwrap().output_tokens, Some(2));
    }

    #[test]
    fn finish_reason_is_first_non_empty_seen() {
        let finish = crate::model::FinishReasonDirectives { mode: Some(FinishReasonMode::Openai), path: None };
        let mut agg = StreamMetricsAggregator::new(Default::default(), finish);
        agg.on_sse_data_json(&json!({"choices": [{"finish_reason": null}]}));
        agg.on_sse_data_json(&json!({"choices": [{"finish_reason": "stop"}]}));
        agg.on_sse_data_json(&json!({"choices": [{"finish_reason": "length"}]}));
        let (_, _, finish_reason, _) = agg.result();
        assert_eq!(finish_reason.as_deref(), Some("stop"));
    }
}
