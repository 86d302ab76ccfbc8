//! Pipeline events: the unit written to the machine stream and shown to humans

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle tag carried by every event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Started,
    Running,
    Completed,
    Failed,
    Retrying,
    StepProgress,
    ToolActivity,
    ContractValidating,
}

impl EventState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::Started => "started",
            EventState::Running => "running",
            EventState::Completed => "completed",
            EventState::Failed => "failed",
            EventState::Retrying => "retrying",
            EventState::StepProgress => "step_progress",
            EventState::ToolActivity => "tool_activity",
            EventState::ContractValidating => "contract_validating",
        }
    }
}

impl std::fmt::Display for EventState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity attached to every event so concurrent steps can be told apart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepIdentity {
    pub pipeline_id: String,
    pub step_id: String,
    pub persona: String,
}

impl StepIdentity {
    pub fn new(
        pipeline_id: impl Into<String>,
        step_id: impl Into<String>,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            step_id: step_id.into(),
            persona: persona.into(),
        }
    }
}

/// One pipeline event
///
/// Optional fields are omitted from the JSON when they do not apply; a zero
/// is always a real value, never a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub pipeline_id: String,
    pub step_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub persona: String,
    pub state: EventState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Event {
    pub fn new(identity: &StepIdentity, state: EventState) -> Self {
        Self {
            timestamp: Utc::now(),
            pipeline_id: identity.pipeline_id.clone(),
            step_id: identity.step_id.clone(),
            persona: identity.persona.clone(),
            state,
            message: None,
            tool_name: None,
            tool_target: None,
            model: None,
            adapter_type: None,
            estimated_time_ms: None,
            tokens_used: None,
            duration_ms: None,
            artifacts: Vec::new(),
            error: None,
            failure_kind: None,
            remediation: None,
        }
    }

    /// A tool invocation observed in the agent's output stream
    pub fn tool_activity(identity: &StepIdentity, tool_name: &str, tool_target: &str) -> Self {
        Self {
            tool_name: Some(tool_name.to_string()),
            tool_target: Some(tool_target.to_string()),
            ..Self::new(identity, EventState::ToolActivity)
        }
    }

    /// Heartbeat; no estimate source exists yet, so the ETA is always zero
    pub fn step_progress(identity: &StepIdentity) -> Self {
        Self {
            estimated_time_ms: Some(0),
            ..Self::new(identity, EventState::StepProgress)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_model(mut self, model: Option<&str>, adapter_type: &str) -> Self {
        self.model = model.map(str::to_string);
        self.adapter_type = Some(adapter_type.to_string());
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_failure(
        mut self,
        error: impl Into<String>,
        kind: &str,
        remediation: impl Into<String>,
    ) -> Self {
        self.error = Some(error.into());
        self.failure_kind = Some(kind.to_string());
        self.remediation = Some(remediation.into());
        self
    }

    pub fn is_tool_activity(&self) -> bool {
        self.state == EventState::ToolActivity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> StepIdentity {
        StepIdentity::new("pipe-1", "plan", "architect")
    }

    #[test]
    fn test_tool_activity_serialization_omits_absent_fields() {
        let event = Event::tool_activity(&identity(), "Read", "/a/b.go");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["state"], "tool_activity");
        assert_eq!(json["pipeline_id"], "pipe-1");
        assert_eq!(json["step_id"], "plan");
        assert_eq!(json["persona"], "architect");
        assert_eq!(json["tool_name"], "Read");
        assert_eq!(json["tool_target"], "/a/b.go");
        assert!(json.get("model").is_none());
        assert!(json.get("tokens_used").is_none());
        assert!(json.get("estimated_time_ms").is_none());
        assert!(json.get("artifacts").is_none());
    }

    #[test]
    fn test_empty_tool_target_is_still_present() {
        let event = Event::tool_activity(&identity(), "Custom", "");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["tool_target"], "");
    }

    #[test]
    fn test_step_progress_reports_zero_eta() {
        let json = serde_json::to_value(Event::step_progress(&identity())).unwrap();
        assert_eq!(json["state"], "step_progress");
        assert_eq!(json["estimated_time_ms"], 0);
    }

    #[test]
    fn test_zero_tokens_are_serialized() {
        let event = Event::new(&identity(), EventState::Completed).with_tokens(0);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["tokens_used"], 0);
    }

    #[test]
    fn test_event_round_trips_with_unknown_fields() {
        let line = r#"{"timestamp":"2026-01-01T00:00:00Z","pipeline_id":"p","step_id":"s","state":"running","model":"opus","adapter_type":"claude","future_field":1}"#;
        let event: Event = serde_json::from_str(line).unwrap();
        assert_eq!(event.state, EventState::Running);
        assert_eq!(event.model.as_deref(), Some("opus"));
        assert_eq!(event.persona, "");
    }

    #[test]
    fn test_state_names() {
        assert_eq!(EventState::ContractValidating.to_string(), "contract_validating");
        assert_eq!(
            serde_json::to_string(&EventState::StepProgress).unwrap(),
            "\"step_progress\""
        );
    }
}
