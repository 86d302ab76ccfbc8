//! Agent adapters: run one prompt through an agent CLI and report the outcome

pub mod claude;
pub mod classify;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::subprocess::streaming::{StreamEvent, StreamingOutput};
use crate::subprocess::{ExitStatus, ProcessError, TerminationRecord};

pub use claude::ClaudeAdapter;
pub use classify::{classify, detect_exhaustion, AdapterError};

/// Per-event hook installed by the caller
///
/// Backends that cannot stream never call it, so an unset slot means no
/// events are produced.
pub type StreamEventCallback = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

/// Configuration for a single adapter invocation
#[derive(Clone, Default)]
pub struct AdapterRunConfig {
    pub prompt: String,
    pub timeout: Option<Duration>,
    pub model: Option<String>,
    /// Adapter identifier, e.g. `claude`
    pub adapter: String,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub on_stream_event: Option<StreamEventCallback>,
}

impl std::fmt::Debug for AdapterRunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRunConfig")
            .field("prompt_len", &self.prompt.len())
            .field("timeout", &self.timeout)
            .field("model", &self.model)
            .field("adapter", &self.adapter)
            .field("working_dir", &self.working_dir)
            .field("env_keys", &self.env.keys().collect::<Vec<_>>())
            .field("streaming", &self.on_stream_event.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

/// Final outcome of one adapter run, built once when the run concludes
#[derive(Debug, Clone)]
pub struct AdapterResult {
    pub exit_status: ExitStatus,
    pub tokens: TokenUsage,
    /// Content of the final result line, if one was observed
    pub result_content: Option<String>,
    /// Text captured before the run ended, kept for failed runs
    pub partial_content: String,
    pub error: Option<AdapterError>,
    pub stderr_tail: String,
    pub termination: TerminationRecord,
    pub session_id: Option<String>,
    pub cost_usd: Option<f64>,
    pub duration: Duration,
}

impl AdapterResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<StreamingOutput> for AdapterResult {
    fn from(output: StreamingOutput) -> Self {
        let error = classify(&output);
        let final_event = output.final_result.as_ref();
        let payload = final_event.and_then(|event| event.result.as_ref());

        let tokens = final_event
            .map(|event| TokenUsage {
                input: event.tokens_in.unwrap_or(0),
                output: event.tokens_out.unwrap_or(0),
                cache_read: payload.and_then(|p| p.cache_read_tokens).unwrap_or(0),
            })
            .unwrap_or_default();

        Self {
            exit_status: output.status.clone(),
            tokens,
            result_content: payload.map(|p| p.content.clone()),
            session_id: payload.and_then(|p| p.session_id.clone()),
            cost_usd: payload.and_then(|p| p.cost_usd),
            partial_content: output.partial_text,
            error,
            stderr_tail: output.stderr_tail,
            termination: output.termination,
            duration: output.duration,
        }
    }
}

/// Executes a prompt through an agent backend
///
/// Spawn failures are returned as `Err`; every run that started produces an
/// [`AdapterResult`], successful or classified.
#[async_trait]
pub trait AdapterRunner: Send + Sync {
    async fn run(&self, config: &AdapterRunConfig) -> Result<AdapterResult, ProcessError>;

    /// Identifier reported as `adapter_type` on step events
    fn name(&self) -> &str;
}
