//! Dual-stream event emitter
//!
//! Every event goes to the display consumer (if any) and then, always and
//! unthrottled, to the machine-readable NDJSON stream.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::{Arc, Mutex};

use super::types::Event;
use crate::error::{ErrorCode, StreamError};

/// A human-facing consumer of progress events
pub trait ProgressEmitter: Send + Sync {
    fn emit_progress(&self, event: &Event) -> Result<()>;
}

/// Single choke point for all pipeline events
pub struct EventEmitter {
    display: Option<Arc<dyn ProgressEmitter>>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl EventEmitter {
    pub fn new(writer: Box<dyn Write + Send>, display: Option<Arc<dyn ProgressEmitter>>) -> Self {
        Self {
            display,
            writer: Mutex::new(writer),
        }
    }

    /// Machine stream on stdout
    pub fn stdout(display: Option<Arc<dyn ProgressEmitter>>) -> Self {
        Self::new(Box::new(std::io::stdout()), display)
    }

    /// Emit an event, logging rather than propagating failures
    ///
    /// Display problems must never interrupt a running step.
    pub fn emit(&self, event: &Event) {
        if let Err(e) = self.try_emit(event) {
            tracing::warn!("Failed to emit {} event: {}", event.state, e);
        }
    }

    /// Emit an event, reporting the first failure
    ///
    /// The machine stream is written even when the display consumer fails.
    pub fn try_emit(&self, event: &Event) -> std::result::Result<(), StreamError> {
        let display_result = match &self.display {
            Some(display) => display.emit_progress(event),
            None => Ok(()),
        };

        self.write_machine(event)?;

        display_result.map_err(|e| {
            StreamError::event_with_code(ErrorCode::EVENT_DISPLAY_FAILED, e.to_string())
        })
    }

    fn write_machine(&self, event: &Event) -> std::result::Result<(), StreamError> {
        let line = serde_json::to_string(event).map_err(|e| {
            StreamError::event_with_code(
                ErrorCode::EVENT_SERIALIZATION_FAILED,
                "failed to serialize event",
            )
            .with_source(e)
        })?;

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        write_line(&mut **writer, &line).map_err(|e| {
            StreamError::event_with_code(ErrorCode::EVENT_WRITE_FAILED, e.to_string())
        })
    }

    /// Flush the machine stream
    pub fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.flush().context("Failed to flush event stream")
    }
}

fn write_line(writer: &mut dyn Write, line: &str) -> Result<()> {
    writer
        .write_all(line.as_bytes())
        .context("Failed to write event")?;
    writer
        .write_all(b"\n")
        .context("Failed to write event newline")?;
    writer.flush().context("Failed to flush event")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// In-memory writer shared with the test for inspection
    #[derive(Clone, Default)]
    pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Display consumer that records every event it receives
    #[derive(Default)]
    pub struct RecordingDisplay {
        pub events: Mutex<Vec<Event>>,
    }

    impl RecordingDisplay {
        pub fn states(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.state.to_string())
                .collect()
        }

        pub fn targets(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.tool_target.clone().unwrap_or_default())
                .collect()
        }
    }

    impl ProgressEmitter for RecordingDisplay {
        fn emit_progress(&self, event: &Event) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }
}
