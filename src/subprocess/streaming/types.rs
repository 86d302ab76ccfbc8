//! Core types for streaming infrastructure

use std::time::Duration;

use super::parser::ParseOptions;
use crate::subprocess::termination::TerminationRecord;
use crate::subprocess::ExitStatus;

/// Category of a parsed subprocess output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventKind {
    /// Session initialization marker
    Init,
    /// The agent invoked a named tool
    ToolUse,
    /// Free text produced by the agent
    Text,
    /// Response to a tool call; `parse_line` folds these into the
    /// preceding tool use and never emits them
    ToolResult,
    /// Terminating result line carrying totals
    Result,
}

impl StreamEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamEventKind::Init => "init",
            StreamEventKind::ToolUse => "tool_use",
            StreamEventKind::Text => "text",
            StreamEventKind::ToolResult => "tool_result",
            StreamEventKind::Result => "result",
        }
    }
}

/// Details only present on the final result line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPayload {
    /// Full, untruncated result content
    pub content: String,
    /// Completion subtype, e.g. `success` or `error_max_turns`
    pub subtype: Option<String>,
    pub stop_reason: Option<String>,
    pub is_error: bool,
    pub cache_read_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    pub num_turns: Option<u64>,
    pub session_id: Option<String>,
}

/// One event parsed from a line of subprocess output
///
/// Created per line and dropped once the run callback returns.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub kind: StreamEventKind,
    /// Set only for [`StreamEventKind::ToolUse`]
    pub tool_name: Option<String>,
    /// Human-readable target of the tool call, possibly empty
    pub tool_target: String,
    /// Display text, truncated
    pub text: String,
    /// Set only for [`StreamEventKind::Result`]
    pub tokens_in: Option<u64>,
    pub tokens_out: Option<u64>,
    pub model: Option<String>,
    pub result: Option<ResultPayload>,
}

impl StreamEvent {
    pub fn new(kind: StreamEventKind) -> Self {
        Self {
            kind,
            tool_name: None,
            tool_target: String::new(),
            text: String::new(),
            tokens_in: None,
            tokens_out: None,
            model: None,
            result: None,
        }
    }

    pub fn tool_use(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            tool_name: Some(name.into()),
            tool_target: target.into(),
            ..Self::new(StreamEventKind::ToolUse)
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::new(StreamEventKind::Text)
        }
    }

    pub fn is_tool_use(&self) -> bool {
        self.kind == StreamEventKind::ToolUse
    }
}

/// Outcome of parsing a single line
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// Zero or more events, in content-block order
    Events(Vec<StreamEvent>),
    /// The line could not be interpreted and should be skipped
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    Oversized(usize),
    InvalidJson(String),
    NotAnObject,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Empty => write!(f, "empty line"),
            SkipReason::Oversized(len) => write!(f, "line of {} bytes exceeds limit", len),
            SkipReason::InvalidJson(err) => write!(f, "invalid JSON: {}", err),
            SkipReason::NotAnObject => write!(f, "JSON value is not an object"),
        }
    }
}

/// Limits applied while streaming one subprocess
#[derive(Debug, Clone)]
pub struct StreamLimits {
    pub parse: ParseOptions,
    /// Time between the graceful and forced termination signals
    pub grace_period: Duration,
    pub stderr_tail_bytes: usize,
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            parse: ParseOptions::default(),
            grace_period: Duration::from_secs(3),
            stderr_tail_bytes: 64 * 1024,
        }
    }
}

/// Everything the read loop accumulated for one subprocess run
#[derive(Debug, Clone)]
pub struct StreamingOutput {
    pub status: ExitStatus,
    /// The single final result event, if one was observed
    pub final_result: Option<StreamEvent>,
    /// Text seen before termination, concatenated in arrival order
    pub partial_text: String,
    pub stderr_tail: String,
    pub lines_read: usize,
    pub lines_skipped: usize,
    pub timed_out: bool,
    pub termination: TerminationRecord,
    pub duration: Duration,
}
