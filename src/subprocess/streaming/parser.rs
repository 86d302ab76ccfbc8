//! Stream line parser for agent CLI `stream-json` output
//!
//! Every line is an independent JSON object. Parsing never fails hard: lines
//! that cannot be interpreted come back as [`ParsedLine::Skip`] so the read
//! loop can log them and move on.

use serde_json::Value;

use super::tool_target::{extract_tool_target_with_width, truncate_chars};
use super::types::{ParsedLine, ResultPayload, SkipReason, StreamEvent, StreamEventKind};

/// Limits applied while turning a line into events
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub max_line_bytes: usize,
    pub text_preview_chars: usize,
    pub command_display_chars: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_line_bytes: 10 * 1024 * 1024,
            text_preview_chars: 200,
            command_display_chars: 60,
        }
    }
}

/// Parse one line of subprocess output
pub fn parse_line(line: &str, options: &ParseOptions) -> ParsedLine {
    if line.len() > options.max_line_bytes {
        return ParsedLine::Skip(SkipReason::Oversized(line.len()));
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ParsedLine::Skip(SkipReason::Empty);
    }

    let json: Value = match serde_json::from_str(trimmed) {
        Ok(json) => json,
        Err(e) => return ParsedLine::Skip(SkipReason::InvalidJson(e.to_string())),
    };

    if !json.is_object() {
        return ParsedLine::Skip(SkipReason::NotAnObject);
    }

    ParsedLine::Events(parse_object(&json, options))
}

fn parse_object(json: &Value, options: &ParseOptions) -> Vec<StreamEvent> {
    match extract_string_field(json, "type", "") {
        "system" => parse_system(json).into_iter().collect(),
        "assistant" => parse_assistant(json, options),
        "result" => vec![parse_result(json, options)],
        "tool_use" => vec![parse_top_level_tool_use(json, options)],
        // Tool results, bare or echoed back in `user` lines, answer a tool_use
        // that was already reported
        _ => Vec::new(),
    }
}

// Pure helper functions for JSON field extraction

fn extract_string_field<'a>(json: &'a Value, field: &str, default: &'a str) -> &'a str {
    json.get(field).and_then(Value::as_str).unwrap_or(default)
}

fn optional_string(json: &Value, field: &str) -> Option<String> {
    json.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn optional_u64(json: &Value, field: &str) -> Option<u64> {
    json.get(field).and_then(Value::as_u64)
}

fn parse_system(json: &Value) -> Option<StreamEvent> {
    if extract_string_field(json, "subtype", "") != "init" {
        return None;
    }
    Some(StreamEvent {
        model: optional_string(json, "model"),
        ..StreamEvent::new(StreamEventKind::Init)
    })
}

fn parse_assistant(json: &Value, options: &ParseOptions) -> Vec<StreamEvent> {
    let Some(blocks) = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    blocks
        .iter()
        .filter_map(|block| parse_content_block(block, options))
        .collect()
}

fn parse_content_block(block: &Value, options: &ParseOptions) -> Option<StreamEvent> {
    match extract_string_field(block, "type", "") {
        "tool_use" => {
            let name = extract_string_field(block, "name", "");
            let input = block.get("input").unwrap_or(&Value::Null);
            let target = extract_tool_target_with_width(name, input, options.command_display_chars);
            Some(StreamEvent::tool_use(name, target))
        }
        "text" => {
            let text = extract_string_field(block, "text", "");
            if text.trim().is_empty() {
                return None;
            }
            Some(StreamEvent::text(truncate_chars(
                text,
                options.text_preview_chars,
            )))
        }
        _ => None,
    }
}

/// Top-level `tool_use` lines as emitted by other agent CLIs
fn parse_top_level_tool_use(json: &Value, options: &ParseOptions) -> StreamEvent {
    let name = json
        .get("tool_name")
        .or_else(|| json.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let input = json
        .get("parameters")
        .or_else(|| json.get("input"))
        .unwrap_or(&Value::Null);
    let target = extract_tool_target_with_width(name, input, options.command_display_chars);
    StreamEvent::tool_use(name, target)
}

fn parse_result(json: &Value, options: &ParseOptions) -> StreamEvent {
    let usage = json.get("usage").unwrap_or(&Value::Null);
    let content = extract_string_field(json, "result", "").to_string();

    let payload = ResultPayload {
        subtype: optional_string(json, "subtype"),
        stop_reason: optional_string(json, "stop_reason"),
        is_error: json
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        cache_read_tokens: optional_u64(usage, "cache_read_input_tokens"),
        cost_usd: json.get("total_cost_usd").and_then(Value::as_f64),
        num_turns: optional_u64(json, "num_turns"),
        session_id: optional_string(json, "session_id"),
        content: content.clone(),
    };

    StreamEvent {
        text: truncate_chars(&content, options.text_preview_chars),
        tokens_in: Some(optional_u64(usage, "input_tokens").unwrap_or(0)),
        tokens_out: Some(optional_u64(usage, "output_tokens").unwrap_or(0)),
        result: Some(payload),
        ..StreamEvent::new(StreamEventKind::Result)
    }
}
