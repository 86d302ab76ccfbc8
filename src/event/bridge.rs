//! Bridge from raw subprocess stream events to pipeline events

use std::sync::Arc;

use super::emitter::EventEmitter;
use super::types::{Event, StepIdentity};
use crate::adapter::StreamEventCallback;
use crate::subprocess::streaming::StreamEvent;

/// Map a stream event to a tool-activity event, if it represents one
pub fn to_tool_activity(identity: &StepIdentity, event: &StreamEvent) -> Option<Event> {
    if !event.is_tool_use() {
        return None;
    }
    let tool_name = event.tool_name.as_deref().filter(|name| !name.is_empty())?;
    Some(Event::tool_activity(identity, tool_name, &event.tool_target))
}

/// Build the per-event callback installed on an adapter run
///
/// Runs synchronously inside the read loop, so it only enriches and emits.
pub fn tool_activity_bridge(
    emitter: Arc<EventEmitter>,
    identity: StepIdentity,
) -> StreamEventCallback {
    Arc::new(move |event: &StreamEvent| {
        if let Some(activity) = to_tool_activity(&identity, event) {
            emitter.emit(&activity);
        }
    })
}
