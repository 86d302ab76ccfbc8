//! Common test utilities and helpers

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use stepstream::event::ProgressEmitter;
use stepstream::Event;

pub const INIT_LINE: &str =
    r#"{"type":"system","subtype":"init","model":"claude-sonnet-4","session_id":"s-1"}"#;
pub const READ_LINE: &str = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/repo/src/main.rs"}}]}}"#;
pub const BASH_LINE: &str = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t2","name":"Bash","input":{"command":"cargo test"}}]}}"#;
pub const TEXT_LINE: &str =
    r#"{"type":"assistant","message":{"content":[{"type":"text","text":"tests pass"}]}}"#;
pub const RESULT_LINE: &str = r#"{"type":"result","subtype":"success","is_error":false,"result":"all done","usage":{"input_tokens":120,"output_tokens":30},"total_cost_usd":0.01,"session_id":"s-1"}"#;
pub const MAX_TURNS_LINE: &str = r#"{"type":"result","subtype":"error_max_turns","is_error":true,"result":"","usage":{"input_tokens":900,"output_tokens":100}}"#;

/// A fake agent CLI: a shell script that ignores its arguments
pub struct FakeAgent {
    temp_dir: TempDir,
    path: PathBuf,
}

impl FakeAgent {
    pub fn new(body: &str) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("claude");
        {
            let mut file = fs::File::create(&path)?;
            writeln!(file, "#!/bin/sh")?;
            writeln!(file, "{}", body)?;
            file.sync_all()?;
        }
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(Self { temp_dir, path })
    }

    /// Script that echoes each line in order
    pub fn printing(lines: &[&str]) -> Result<Self> {
        let body = lines
            .iter()
            .map(|line| format!("echo '{}'", line))
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(&body)
    }

    pub fn binary(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn dir(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }
}

/// In-memory NDJSON sink shared with the emitter
#[derive(Clone, Default)]
pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    pub fn lines(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    pub fn states(&self) -> Vec<String> {
        self.lines()
            .iter()
            .map(|line| line["state"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

/// Display consumer that records what reached it
#[derive(Default)]
pub struct RecordingDisplay {
    pub events: Mutex<Vec<Event>>,
}

impl ProgressEmitter for RecordingDisplay {
    fn emit_progress(&self, event: &Event) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

impl RecordingDisplay {
    pub fn states(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.state.as_str().to_string())
            .collect()
    }
}
