//! Stock display consumers for the human-facing event path

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::emitter::ProgressEmitter;
use super::types::{Event, EventState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DisplayMode {
    /// One live spinner per step
    Rich,
    /// One plain line per event
    Plain,
    /// No human output
    Quiet,
}

/// Build the display consumer for a mode
pub fn display_for(mode: DisplayMode) -> Arc<dyn ProgressEmitter> {
    match mode {
        DisplayMode::Rich => Arc::new(SpinnerProgress::new()),
        DisplayMode::Plain => Arc::new(ConsoleProgress::stderr()),
        DisplayMode::Quiet => Arc::new(QuietProgress),
    }
}

fn step_label(event: &Event) -> String {
    if event.persona.is_empty() {
        event.step_id.clone()
    } else {
        format!("{} ({})", event.step_id, event.persona)
    }
}

fn format_tool(event: &Event) -> String {
    let name = event.tool_name.as_deref().unwrap_or("tool");
    match event.tool_target.as_deref().filter(|t| !t.is_empty()) {
        Some(target) => format!("{} {}", name, target),
        None => name.to_string(),
    }
}

fn format_completion(event: &Event) -> String {
    let mut details = Vec::new();
    if let Some(tokens) = event.tokens_used {
        details.push(format!("{} tokens", tokens));
    }
    if let Some(ms) = event.duration_ms {
        details.push(format!("{:.1}s", ms as f64 / 1000.0));
    }
    if details.is_empty() {
        String::new()
    } else {
        format!(" ({})", details.join(", "))
    }
}

fn format_failure(event: &Event) -> String {
    let error = event.error.as_deref().unwrap_or("step failed");
    match event.remediation.as_deref() {
        Some(hint) => format!("{} | hint: {}", error, hint),
        None => error.to_string(),
    }
}

/// Render one event as a single plain-text line
pub fn format_event_line(event: &Event) -> Option<String> {
    let label = step_label(event);
    let line = match event.state {
        EventState::Started => format!("▶️  [{}] started", label),
        EventState::Running => {
            let model = event.model.as_deref().unwrap_or("default model");
            let adapter = event.adapter_type.as_deref().unwrap_or("adapter");
            format!("🚀 [{}] running on {} ({})", label, adapter, model)
        }
        EventState::ToolActivity => format!("🔧 [{}] {}", label, format_tool(event)),
        EventState::StepProgress => return None,
        EventState::Completed => format!("✅ [{}] completed{}", label, format_completion(event)),
        EventState::Failed => format!("❌ [{}] failed: {}", label, format_failure(event)),
        EventState::Retrying => format!("🔁 [{}] retrying", label),
        EventState::ContractValidating => format!("🔍 [{}] validating output", label),
    };
    Some(match &event.message {
        Some(message) if event.state != EventState::Failed => format!("{} {}", line, message),
        _ => line,
    })
}

/// Plain text, one line per event
pub struct ConsoleProgress {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleProgress {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }
}

impl ProgressEmitter for ConsoleProgress {
    fn emit_progress(&self, event: &Event) -> Result<()> {
        let Some(line) = format_event_line(event) else {
            return Ok(());
        };
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

/// Discards every event
pub struct QuietProgress;

impl ProgressEmitter for QuietProgress {
    fn emit_progress(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}

/// Live terminal view with one spinner line per running step
pub struct SpinnerProgress {
    multi_progress: MultiProgress,
    bars: Mutex<HashMap<(String, String), ProgressBar>>,
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl SpinnerProgress {
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {elapsed:>4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn new_bar(&self) -> ProgressBar {
        let bar = self.multi_progress.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }

    fn bar_for(&self, event: &Event) -> ProgressBar {
        let key = (event.pipeline_id.clone(), event.step_id.clone());
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.entry(key).or_insert_with(|| self.new_bar()).clone()
    }

    fn remove_bar(&self, event: &Event) -> Option<ProgressBar> {
        let key = (event.pipeline_id.clone(), event.step_id.clone());
        self.bars
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key)
    }
}

impl ProgressEmitter for SpinnerProgress {
    fn emit_progress(&self, event: &Event) -> Result<()> {
        let label = step_label(event);
        match event.state {
            EventState::Completed => {
                let bar = self.remove_bar(event).unwrap_or_else(|| self.new_bar());
                bar.finish_with_message(format!(
                    "✅ {} completed{}",
                    label,
                    format_completion(event)
                ));
            }
            EventState::Failed => {
                let bar = self.remove_bar(event).unwrap_or_else(|| self.new_bar());
                bar.abandon_with_message(format!(
                    "❌ {} failed: {}",
                    label,
                    format_failure(event)
                ));
            }
            EventState::StepProgress => self.bar_for(event).tick(),
            EventState::ToolActivity => {
                self.bar_for(event)
                    .set_message(format!("{} 🔧 {}", label, format_tool(event)));
            }
            _ => {
                if let Some(line) = format_event_line(event) {
                    self.bar_for(event).set_message(line);
                }
            }
        }
        Ok(())
    }
}
