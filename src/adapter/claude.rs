//! Claude CLI adapter running in `stream-json` mode

use async_trait::async_trait;
use std::time::Duration;

use super::{AdapterResult, AdapterRunConfig, AdapterRunner};
use crate::subprocess::streaming::{StreamLimits, StreamingCommandRunner};
use crate::subprocess::{ProcessCommand, ProcessCommandBuilder, ProcessError};

pub const ADAPTER_NAME: &str = "claude";

/// Runs prompts through the `claude` CLI with real-time output
#[derive(Debug, Clone)]
pub struct ClaudeAdapter {
    binary: String,
    runner: StreamingCommandRunner,
    default_timeout: Option<Duration>,
}

impl Default for ClaudeAdapter {
    fn default() -> Self {
        Self::new("claude", StreamLimits::default())
    }
}

impl ClaudeAdapter {
    pub fn new(binary: impl Into<String>, limits: StreamLimits) -> Self {
        Self {
            binary: binary.into(),
            runner: StreamingCommandRunner::new(limits),
            default_timeout: None,
        }
    }

    /// Deadline applied when a run does not set its own
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Build the full process command for one run
    pub fn build_command(&self, config: &AdapterRunConfig) -> ProcessCommand {
        let timeout = config
            .timeout
            .or(self.default_timeout)
            .filter(|t| !t.is_zero());

        ProcessCommandBuilder::new(&self.binary)
            .args(build_streaming_claude_args(
                &config.prompt,
                config.model.as_deref(),
            ))
            .envs(&config.env)
            .current_dir(config.working_dir.as_deref())
            .timeout(timeout)
            // Claude waits on stdin unless it is closed
            .stdin(String::new())
            .build()
    }
}

/// Build arguments requesting line-delimited real-time output
///
/// Without `--output-format stream-json` the CLI buffers everything until
/// exit and no progress can be shown.
pub fn build_streaming_claude_args(prompt: &str, model: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "--print".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
        "--dangerously-skip-permissions".to_string(),
    ];
    if let Some(model) = model.filter(|m| !m.is_empty()) {
        args.push("--model".to_string());
        args.push(model.to_string());
    }
    args.push(prompt.to_string());
    args
}

#[async_trait]
impl AdapterRunner for ClaudeAdapter {
    async fn run(&self, config: &AdapterRunConfig) -> Result<AdapterResult, ProcessError> {
        let command = self.build_command(config);
        tracing::info!(
            "Running {} (model: {}, timeout: {:?})",
            self.binary,
            config.model.as_deref().unwrap_or("default"),
            command.timeout
        );

        let output = self
            .runner
            .run_streaming(&command, config.on_stream_event.as_deref())
            .await?;

        tracing::debug!(
            "{} finished with {} after {:?} ({} lines, {} skipped)",
            self.binary,
            output.status,
            output.duration,
            output.lines_read,
            output.lines_skipped
        );

        let result = AdapterResult::from(output);
        if let Some(err) = &result.error {
            tracing::warn!("{} run failed: {} ({})", self.binary, err, err.kind());
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        ADAPTER_NAME
    }
}
