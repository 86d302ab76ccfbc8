//! Signal delivery for subprocess trees
//!
//! Subprocesses are spawned in their own process group, so signals are sent
//! to the negated pid and reach every descendant the agent CLI started.

use serde::Serialize;
use std::time::Duration;

/// Signals delivered to a subprocess while enforcing its deadline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TerminationRecord {
    /// SIGTERM was sent when the deadline passed
    pub graceful: bool,
    /// SIGKILL was sent after the grace period ran out
    pub forced: bool,
    /// How long the process was allowed to run before the graceful signal
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Duration>,
}

impl TerminationRecord {
    pub fn is_empty(&self) -> bool {
        !self.graceful && !self.forced
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Graceful,
    Forced,
}

/// Send a termination signal to the process group led by `pid`
#[cfg(unix)]
pub fn signal_process_group(pid: u32, signal: TerminationSignal) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let sig = match signal {
        TerminationSignal::Graceful => Signal::SIGTERM,
        TerminationSignal::Forced => Signal::SIGKILL,
    };

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    // Negative PID addresses the whole process group
    match kill(Pid::from_raw(-raw), sig) {
        Ok(()) => {
            tracing::debug!("Sent {:?} to process group {}", sig, raw);
            true
        }
        Err(errno) => {
            tracing::debug!("Failed to send {:?} to process group {}: {}", sig, raw, errno);
            false
        }
    }
}

#[cfg(not(unix))]
pub fn signal_process_group(_pid: u32, _signal: TerminationSignal) -> bool {
    false
}

/// Deliver a termination signal to a running child
///
/// Falls back to `start_kill` when group signalling is unavailable.
pub fn terminate_child(child: &mut tokio::process::Child, signal: TerminationSignal) {
    let delivered = child
        .id()
        .map(|pid| signal_process_group(pid, signal))
        .unwrap_or(false);

    if !delivered && signal == TerminationSignal::Forced {
        if let Err(e) = child.start_kill() {
            tracing::debug!("start_kill failed: {}", e);
        }
    } else if !delivered {
        tracing::debug!("Graceful signal not delivered; waiting for forced kill");
    }
}
