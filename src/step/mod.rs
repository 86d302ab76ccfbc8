//! Step execution: wires one adapter run to the pipeline event stream
//!
//! A step announces itself as `running`, streams tool activity through the
//! bridge while the agent works, optionally emits heartbeats, and ends with
//! exactly one `completed` or `failed` event.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{AdapterResult, AdapterRunConfig, AdapterRunner};
use crate::event::{tool_activity_bridge, Event, EventEmitter, EventState, StepIdentity};
use crate::subprocess::ProcessError;

const SPAWN_REMEDIATION: &str = "check that the agent CLI is installed and on PATH";

/// Everything the scheduler supplies for one step run
#[derive(Debug, Clone, Default)]
pub struct StepRequest {
    pub identity: StepIdentity,
    pub prompt: String,
    pub model: Option<String>,
    pub timeout: Option<Duration>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

pub struct StepExecutor {
    adapter: Arc<dyn AdapterRunner>,
    emitter: Arc<EventEmitter>,
    heartbeat_interval: Option<Duration>,
}

impl StepExecutor {
    pub fn new(adapter: Arc<dyn AdapterRunner>, emitter: Arc<EventEmitter>) -> Self {
        Self {
            adapter,
            emitter,
            heartbeat_interval: None,
        }
    }

    /// Emit `step_progress` heartbeats at this interval while the step runs
    pub fn with_heartbeat(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval.filter(|i| !i.is_zero());
        self
    }

    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    pub async fn execute(&self, request: &StepRequest) -> Result<AdapterResult, ProcessError> {
        let identity = &request.identity;
        tracing::info!(
            "Starting step {} of pipeline {} as {}",
            identity.step_id,
            identity.pipeline_id,
            identity.persona
        );

        self.emitter.emit(
            &Event::new(identity, EventState::Running)
                .with_model(request.model.as_deref(), self.adapter.name()),
        );

        let config = AdapterRunConfig {
            prompt: request.prompt.clone(),
            timeout: request.timeout,
            model: request.model.clone(),
            adapter: self.adapter.name().to_string(),
            working_dir: request.working_dir.clone(),
            env: request.env.clone(),
            on_stream_event: Some(tool_activity_bridge(
                Arc::clone(&self.emitter),
                identity.clone(),
            )),
        };

        let heartbeat = self.heartbeat_interval.map(|interval| {
            spawn_heartbeat(Arc::clone(&self.emitter), identity.clone(), interval)
        });

        let outcome = self.adapter.run(&config).await;

        if let Some(handle) = heartbeat {
            handle.abort();
            // No heartbeat may follow the terminal event
            let _ = handle.await;
        }

        match &outcome {
            Ok(result) => self.emit_terminal(identity, result),
            Err(err) => {
                tracing::error!("Step {} could not start: {}", identity.step_id, err);
                self.emitter.emit(&Event::new(identity, EventState::Failed).with_failure(
                    err.to_string(),
                    "execution_error",
                    SPAWN_REMEDIATION,
                ));
            }
        }

        outcome
    }

    fn emit_terminal(&self, identity: &StepIdentity, result: &AdapterResult) {
        let duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX);

        let event = match &result.error {
            None => {
                tracing::info!(
                    "Step {} completed in {:?} ({} tokens)",
                    identity.step_id,
                    result.duration,
                    result.tokens.total()
                );
                Event::new(identity, EventState::Completed)
                    .with_tokens(result.tokens.total())
                    .with_duration_ms(duration_ms)
            }
            Some(err) => {
                tracing::warn!(
                    "Step {} failed ({}): {}",
                    identity.step_id,
                    err.kind(),
                    err
                );
                let mut event = Event::new(identity, EventState::Failed)
                    .with_duration_ms(duration_ms)
                    .with_failure(err.to_string(), err.kind(), err.remediation());
                // Token totals only exist when a final result was observed
                if result.result_content.is_some() {
                    event = event.with_tokens(result.tokens.total());
                }
                event
            }
        };

        self.emitter.emit(&event);
    }
}

fn spawn_heartbeat(
    emitter: Arc<EventEmitter>,
    identity: StepIdentity,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            emitter.emit(&Event::step_progress(&identity));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterError, TokenUsage};
    use crate::event::emitter::test_support::SharedBuffer;
    use crate::subprocess::streaming::StreamEvent;
    use crate::subprocess::{ExitStatus, TerminationRecord};
    use async_trait::async_trait;

    /// Adapter that replays canned stream events and returns a fixed result
    struct ScriptedAdapter {
        events: Vec<StreamEvent>,
        error: Option<AdapterError>,
        delay: Duration,
    }

    #[async_trait]
    impl AdapterRunner for ScriptedAdapter {
        async fn run(&self, config: &AdapterRunConfig) -> Result<AdapterResult, ProcessError> {
            if let Some(callback) = &config.on_stream_event {
                for event in &self.events {
                    callback(event);
                }
            }
            tokio::time::sleep(self.delay).await;
            Ok(AdapterResult {
                exit_status: ExitStatus::Success,
                tokens: TokenUsage {
                    input: 30,
                    output: 12,
                    cache_read: 0,
                },
                result_content: self.error.is_none().then(|| "ok".to_string()),
                partial_content: String::new(),
                error: self.error.clone(),
                stderr_tail: String::new(),
                termination: TerminationRecord::default(),
                session_id: None,
                cost_usd: None,
                duration: Duration::from_millis(1500),
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct MissingBinaryAdapter;

    #[async_trait]
    impl AdapterRunner for MissingBinaryAdapter {
        async fn run(&self, _config: &AdapterRunConfig) -> Result<AdapterResult, ProcessError> {
            Err(ProcessError::CommandNotFound("claude".to_string()))
        }

        fn name(&self) -> &str {
            "claude"
        }
    }

    fn request() -> StepRequest {
        StepRequest {
            identity: StepIdentity::new("pipe", "impl", "craftsman"),
            prompt: "do it".to_string(),
            model: Some("sonnet".to_string()),
            ..Default::default()
        }
    }

    fn executor(adapter: impl AdapterRunner + 'static) -> (SharedBuffer, StepExecutor) {
        let buffer = SharedBuffer::default();
        let emitter = Arc::new(EventEmitter::new(Box::new(buffer.clone()), None));
        (buffer, StepExecutor::new(Arc::new(adapter), emitter))
    }

    #[tokio::test]
    async fn test_successful_step_event_sequence() {
        let (buffer, executor) = executor(ScriptedAdapter {
            events: vec![
                StreamEvent::tool_use("Read", "/a"),
                StreamEvent::text("thinking"),
                StreamEvent::tool_use("Bash", "cargo test"),
            ],
            error: None,
            delay: Duration::ZERO,
        });

        let result = executor.execute(&request()).await.unwrap();
        assert!(result.is_success());

        let lines = buffer.lines();
        let states: Vec<_> = lines.iter().map(|l| l["state"].clone()).collect();
        assert_eq!(
            states,
            vec!["running", "tool_activity", "tool_activity", "completed"]
        );
        assert_eq!(lines[0]["model"], "sonnet");
        assert_eq!(lines[0]["adapter_type"], "scripted");
        assert_eq!(lines[1]["persona"], "craftsman");
        assert_eq!(lines[2]["tool_target"], "cargo test");
        assert_eq!(lines[3]["tokens_used"], 42);
        assert_eq!(lines[3]["duration_ms"], 1500);
        assert!(lines[1].get("model").is_none());
    }

    #[tokio::test]
    async fn test_failed_step_carries_remediation() {
        let (buffer, executor) = executor(ScriptedAdapter {
            events: vec![],
            error: Some(AdapterError::DeadlineExceeded {
                timeout: Some(Duration::from_secs(60)),
                forced: false,
            }),
            delay: Duration::ZERO,
        });

        let result = executor.execute(&request()).await.unwrap();
        assert!(!result.is_success());

        let lines = buffer.lines();
        let failed = lines.last().unwrap();
        assert_eq!(failed["state"], "failed");
        assert_eq!(failed["failure_kind"], "deadline_exceeded");
        assert_eq!(failed["error"], "step exceeded its deadline of 60s");
        assert!(failed["remediation"]
            .as_str()
            .unwrap()
            .contains("increase the step timeout"));
        assert!(failed.get("tokens_used").is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure_emits_failed_event_and_returns_error() {
        let (buffer, executor) = executor(MissingBinaryAdapter);
        let err = executor.execute(&request()).await.unwrap_err();
        assert!(matches!(err, ProcessError::CommandNotFound(_)));

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["state"], "failed");
        assert_eq!(lines[1]["remediation"], SPAWN_REMEDIATION);
    }

    #[tokio::test]
    async fn test_heartbeats_report_zero_eta() {
        let (buffer, executor) = executor(ScriptedAdapter {
            events: vec![],
            error: None,
            delay: Duration::from_millis(250),
        });
        let executor = executor.with_heartbeat(Some(Duration::from_millis(50)));

        executor.execute(&request()).await.unwrap();

        let lines = buffer.lines();
        let heartbeats: Vec<_> = lines
            .iter()
            .filter(|l| l["state"] == "step_progress")
            .collect();
        assert!(!heartbeats.is_empty());
        assert!(heartbeats.iter().all(|h| h["estimated_time_ms"] == 0));
        assert_eq!(lines.last().unwrap()["state"], "completed");
    }
}
