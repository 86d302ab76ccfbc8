pub mod builder;
pub mod command;
pub mod error;
pub mod streaming;
pub mod termination;

pub use builder::ProcessCommandBuilder;
pub use command::{ExitStatus, ProcessCommand};
pub use error::ProcessError;
pub use termination::{TerminationRecord, TerminationSignal};
