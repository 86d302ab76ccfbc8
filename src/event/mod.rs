//! Pipeline events and their two delivery paths
//!
//! Every [`Event`] passes through the [`EventEmitter`], which writes it to the
//! machine-readable NDJSON stream and hands it to a display consumer. The
//! display path is usually wrapped in a [`ThrottledProgressEmitter`] so tool
//! bursts do not flood the terminal; the machine path is never throttled.

pub mod bridge;
pub mod display;
pub mod emitter;
pub mod throttle;
pub mod types;

pub use bridge::{to_tool_activity, tool_activity_bridge};
pub use display::{display_for, ConsoleProgress, DisplayMode, QuietProgress, SpinnerProgress};
pub use emitter::{EventEmitter, ProgressEmitter};
pub use throttle::{ThrottledProgressEmitter, DEFAULT_THROTTLE_INTERVAL};
pub use types::{Event, EventState, StepIdentity};
