//! # stepstream
//!
//! Real-time event streaming for agent CLI subprocesses.
//!
//! A pipeline step launches an agent CLI that prints one JSON object per line.
//! This crate reads that stream while the process runs, turns it into typed
//! events, forwards tool activity to a dual-path emitter (NDJSON for machines,
//! throttled display for humans), and classifies the outcome once the process
//! ends.
//!
//! ## Modules
//!
//! - `subprocess` - Process spawning, group termination and the streaming runner
//! - `adapter` - Agent CLI adapters and failure classification
//! - `event` - Pipeline events, the emitter, display consumers and the throttle
//! - `step` - Runs one step end to end and emits its lifecycle events
//! - `config` - File and environment configuration
//! - `error` - Crate error type and stable error codes
pub mod adapter;
pub mod config;
pub mod error;
pub mod event;
pub mod step;
pub mod subprocess;

pub use adapter::{AdapterError, AdapterResult, AdapterRunConfig, AdapterRunner, ClaudeAdapter};
pub use config::{load_config, StreamingConfig};
pub use error::{Result, StreamError};
pub use event::{Event, EventEmitter, EventState, StepIdentity, ThrottledProgressEmitter};
pub use step::{StepExecutor, StepRequest};
pub use subprocess::streaming::{parse_line, StreamEvent, StreamEventKind, StreamingCommandRunner};
