//! Failure classification for finished agent runs
//!
//! A run that did not succeed is sorted into one of four buckets so the
//! caller can tell a step that needs more time from one that needs to be
//! split up or one that genuinely crashed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use crate::error::{ErrorCode, StreamError};
use crate::subprocess::streaming::StreamingOutput;
use crate::subprocess::ExitStatus;

/// Error phrases agent CLIs print when the model runs out of context
static EXHAUSTION_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(prompt is too long|context_length_exceeded|maximum context length|context window exceeded)",
    )
    .expect("Valid regex pattern")
});

const EXHAUSTED_SUBTYPES: &[&str] = &["error_max_turns"];
const EXHAUSTED_STOP_REASONS: &[&str] = &["max_tokens", "model_context_window_exceeded"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdapterError {
    #[error("step exceeded its deadline{}", format_deadline(.timeout))]
    DeadlineExceeded {
        timeout: Option<Duration>,
        /// The process ignored the graceful signal and had to be killed
        forced: bool,
    },

    #[error("agent ran out of working capacity: {reason}")]
    ResourceExhausted { reason: String },

    #[error("agent exited ({status}) before emitting a final result")]
    IncompleteStream {
        status: ExitStatus,
        detail: Option<String>,
    },

    #[error("agent execution failed ({status}): {message}")]
    ExecutionError { status: ExitStatus, message: String },
}

fn format_deadline(timeout: &Option<Duration>) -> String {
    match timeout {
        Some(t) => format!(" of {:?}", t),
        None => String::new(),
    }
}

impl AdapterError {
    /// The next concrete action for whoever reads the failure
    pub fn remediation(&self) -> &'static str {
        match self {
            AdapterError::DeadlineExceeded { .. } => {
                "increase the step timeout or reduce the work the step performs"
            }
            AdapterError::ResourceExhausted { .. } => {
                "break the task into smaller steps or trim the prompt and context"
            }
            AdapterError::IncompleteStream { .. } => {
                "the agent stopped without a final result; check stderr and rerun the step"
            }
            AdapterError::ExecutionError { .. } => {
                "investigate the agent error output; this looks like a genuine failure"
            }
        }
    }

    /// Stable machine-readable tag
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::DeadlineExceeded { .. } => "deadline_exceeded",
            AdapterError::ResourceExhausted { .. } => "resource_exhausted",
            AdapterError::IncompleteStream { .. } => "incomplete_stream",
            AdapterError::ExecutionError { .. } => "execution_error",
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            AdapterError::DeadlineExceeded { .. } => ErrorCode::EXEC_TIMEOUT,
            AdapterError::ResourceExhausted { .. } => ErrorCode::EXEC_RESOURCE_EXHAUSTED,
            AdapterError::IncompleteStream { .. } => ErrorCode::EXEC_INCOMPLETE_STREAM,
            AdapterError::ExecutionError { .. } => ErrorCode::EXEC_SUBPROCESS_FAILED,
        }
    }
}

impl From<AdapterError> for StreamError {
    fn from(err: AdapterError) -> Self {
        let exit_code = match &err {
            AdapterError::IncompleteStream { status, .. }
            | AdapterError::ExecutionError { status, .. } => status.code(),
            _ => None,
        };
        let mut error = StreamError::execution_with_code(err.code(), err.to_string(), None)
            .with_context(err.remediation());
        if let Some(code) = exit_code {
            error = error.with_exit_code(code);
        }
        error
    }
}

/// Classify the terminal state of a run, or `None` if it succeeded
pub fn classify(output: &StreamingOutput) -> Option<AdapterError> {
    let payload = output
        .final_result
        .as_ref()
        .and_then(|event| event.result.as_ref());

    let succeeded = payload.map(|p| !p.is_error).unwrap_or(false)
        && output.status.success()
        && !output.timed_out;
    if succeeded {
        return None;
    }

    if let Some(reason) = detect_exhaustion(output) {
        return Some(AdapterError::ResourceExhausted { reason });
    }

    if output.timed_out {
        return Some(AdapterError::DeadlineExceeded {
            timeout: output.termination.deadline,
            forced: output.termination.forced,
        });
    }

    let Some(payload) = payload else {
        return Some(AdapterError::IncompleteStream {
            status: output.status.clone(),
            detail: last_line(&output.stderr_tail),
        });
    };

    let message = if payload.is_error {
        non_empty(&payload.content)
            .or_else(|| payload.subtype.clone())
            .unwrap_or_else(|| "agent reported an error".to_string())
    } else {
        last_line(&output.stderr_tail).unwrap_or_else(|| format!("process {}", output.status))
    };

    Some(AdapterError::ExecutionError {
        status: output.status.clone(),
        message,
    })
}

/// Look for the agent's own signal that it ran out of capacity
pub fn detect_exhaustion(output: &StreamingOutput) -> Option<String> {
    let payload = output
        .final_result
        .as_ref()
        .and_then(|event| event.result.as_ref());

    if let Some(payload) = payload {
        if let Some(subtype) = payload
            .subtype
            .as_deref()
            .filter(|s| EXHAUSTED_SUBTYPES.contains(s))
        {
            return Some(format!("completion subtype '{}'", subtype));
        }
        if let Some(reason) = payload
            .stop_reason
            .as_deref()
            .filter(|s| EXHAUSTED_STOP_REASONS.contains(s))
        {
            return Some(format!("stop reason '{}'", reason));
        }
    }

    // Only error channels are scanned; assistant prose may discuss context
    // windows without having exhausted one
    let reported_error = payload
        .filter(|p| p.is_error)
        .map(|p| p.content.as_str())
        .unwrap_or("");
    [reported_error, output.stderr_tail.as_str()]
        .iter()
        .find_map(|text| EXHAUSTION_PHRASE.find(text))
        .map(|m| format!("output mentions '{}'", m.as_str().to_lowercase()))
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn last_line(s: &str) -> Option<String> {
    s.lines().rev().find_map(non_empty)
}
