//! Human-readable targets for tool invocations
//!
//! Known tools map to the one input field that names what they act on.
//! Unknown tools fall back to a fixed priority list of common field names so
//! new tool types still show something useful.

use serde_json::Value;

/// How a known tool's target field should be rendered
#[derive(Debug, Clone, Copy)]
enum TargetField {
    Plain(&'static str),
    /// Shell commands are shortened to the display width
    Truncated(&'static str),
}

const TOOL_TARGETS: &[(&str, TargetField)] = &[
    ("Read", TargetField::Plain("file_path")),
    ("Write", TargetField::Plain("file_path")),
    ("Edit", TargetField::Plain("file_path")),
    ("MultiEdit", TargetField::Plain("file_path")),
    ("Glob", TargetField::Plain("pattern")),
    ("Grep", TargetField::Plain("pattern")),
    ("Bash", TargetField::Truncated("command")),
    ("WebFetch", TargetField::Plain("url")),
    ("WebSearch", TargetField::Plain("query")),
    ("Task", TargetField::Plain("description")),
    ("NotebookEdit", TargetField::Plain("notebook_path")),
    ("NotebookRead", TargetField::Plain("notebook_path")),
];

const FALLBACK_FIELDS: &[&str] = &[
    "file_path",
    "url",
    "pattern",
    "command",
    "query",
    "notebook_path",
];

pub const DEFAULT_COMMAND_DISPLAY_CHARS: usize = 60;

/// Derive the display target for a tool call
///
/// Total: returns an empty string when nothing suitable is found.
pub fn extract_tool_target(tool_name: &str, input: &Value) -> String {
    extract_tool_target_with_width(tool_name, input, DEFAULT_COMMAND_DISPLAY_CHARS)
}

pub fn extract_tool_target_with_width(
    tool_name: &str,
    input: &Value,
    command_width: usize,
) -> String {
    let known = TOOL_TARGETS
        .iter()
        .find(|(name, _)| *name == tool_name)
        .map(|(_, field)| *field);

    match known {
        Some(TargetField::Plain(field)) => string_field(input, field).unwrap_or_default(),
        Some(TargetField::Truncated(field)) => string_field(input, field)
            .map(|s| truncate_chars(&s, command_width))
            .unwrap_or_default(),
        None => FALLBACK_FIELDS
            .iter()
            .find_map(|field| string_field(input, field).filter(|s| !s.is_empty()))
            .unwrap_or_default(),
    }
}

fn string_field(input: &Value, field: &str) -> Option<String> {
    input.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Truncate to `max_chars` characters, appending `...` when shortened
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
