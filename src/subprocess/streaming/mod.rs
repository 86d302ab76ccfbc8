//! Real-time streaming infrastructure for subprocess output
//!
//! This module turns an agent CLI's line-delimited JSON output into typed
//! [`StreamEvent`]s while the process runs. Lines are read with a hard size
//! bound, parsed without ever failing the read loop, and handed to an
//! optional per-event hook in arrival order.

pub mod parser;
pub mod reader;
pub mod runner;
pub mod tool_target;
pub mod types;

#[cfg(test)]
mod tests;

pub use parser::{parse_line, ParseOptions};
pub use reader::{BoundedLineReader, RawLine};
pub use runner::{EventHook, StreamingCommandRunner};
pub use tool_target::{extract_tool_target, extract_tool_target_with_width, truncate_chars};
pub use types::{
    ParsedLine, ResultPayload, SkipReason, StreamEvent, StreamEventKind, StreamLimits,
    StreamingOutput,
};
