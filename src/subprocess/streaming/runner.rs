//! Streaming command runner implementation
//!
//! Reads subprocess stdout line by line while it runs, hands every parsed
//! event to the caller, and enforces the deadline with SIGTERM first and
//! SIGKILL only after the grace period.

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::time::Instant;

use super::parser::parse_line;
use super::reader::{BoundedLineReader, RawLine};
use super::types::{
    ParsedLine, SkipReason, StreamEvent, StreamEventKind, StreamLimits, StreamingOutput,
};
use crate::subprocess::command::{extract_stream, parse_exit_status, spawn_configured_process};
use crate::subprocess::termination::{terminate_child, TerminationRecord, TerminationSignal};
use crate::subprocess::{ExitStatus, ProcessCommand, ProcessError};

/// Upper bound on text retained for partial results
const MAX_PARTIAL_TEXT_BYTES: usize = 256 * 1024;

/// Synchronous per-event hook, called in parse order from the read loop
pub type EventHook<'a> = &'a (dyn Fn(&StreamEvent) + Send + Sync);

/// Command runner with streaming support
#[derive(Debug, Clone, Default)]
pub struct StreamingCommandRunner {
    limits: StreamLimits,
}

enum LoopStep {
    Line(std::io::Result<Option<RawLine>>),
    Exited(std::io::Result<std::process::ExitStatus>),
    Deadline,
    ForceKill,
    DrainExpired,
}

/// Accumulated state of one read loop
#[derive(Default)]
struct ReadState {
    final_result: Option<StreamEvent>,
    partial_text: String,
    lines_read: usize,
    lines_skipped: usize,
}

impl ReadState {
    fn record(&mut self, event: &StreamEvent) -> bool {
        match event.kind {
            StreamEventKind::Result => {
                if self.final_result.is_some() {
                    tracing::warn!("Ignoring additional result event after the final result");
                    return false;
                }
                self.final_result = Some(event.clone());
            }
            StreamEventKind::Text => {
                if self.partial_text.len() < MAX_PARTIAL_TEXT_BYTES {
                    if !self.partial_text.is_empty() {
                        self.partial_text.push('\n');
                    }
                    self.partial_text.push_str(&event.text);
                }
            }
            _ => {}
        }
        true
    }
}

impl StreamingCommandRunner {
    /// Create a new streaming command runner
    pub fn new(limits: StreamLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &StreamLimits {
        &self.limits
    }

    /// Run a command, invoking `on_event` for each parsed event as it arrives
    ///
    /// Only spawn and pipe setup failures are errors. Timeouts, crashes and
    /// missing result lines are reported through [`StreamingOutput`].
    pub async fn run_streaming(
        &self,
        command: &ProcessCommand,
        on_event: Option<EventHook<'_>>,
    ) -> Result<StreamingOutput, ProcessError> {
        let start = Instant::now();

        let mut child = spawn_configured_process(command).await?;
        let stdout = extract_stream(child.stdout.take(), "stdout")?;
        let stderr_handle = child.stderr.take().map(|stderr| {
            let max = self.limits.stderr_tail_bytes;
            tokio::spawn(async move { drain_tail(stderr, max).await })
        });

        let mut reader =
            BoundedLineReader::new(BufReader::new(stdout), self.limits.parse.max_line_bytes);

        let deadline = command.timeout.map(|timeout| start + timeout);
        let mut termination = TerminationRecord {
            deadline: command.timeout,
            ..Default::default()
        };
        let mut kill_at: Option<Instant> = None;
        let mut drain_until: Option<Instant> = None;
        let mut stdout_open = true;
        let mut exit: Option<std::process::ExitStatus> = None;
        let mut state = ReadState::default();

        loop {
            if !stdout_open && exit.is_some() {
                break;
            }

            let step = tokio::select! {
                line = reader.next_line(), if stdout_open => LoopStep::Line(line),
                status = child.wait(), if exit.is_none() => LoopStep::Exited(status),
                _ = sleep_until_opt(deadline), if !termination.graceful && exit.is_none() => {
                    LoopStep::Deadline
                }
                _ = sleep_until_opt(kill_at), if !termination.forced && exit.is_none() => {
                    LoopStep::ForceKill
                }
                _ = sleep_until_opt(drain_until), if stdout_open => LoopStep::DrainExpired,
            };

            match step {
                LoopStep::Line(Ok(Some(raw))) => {
                    state.lines_read += 1;
                    self.handle_line(raw, state.lines_read, &mut state, on_event);
                }
                LoopStep::Line(Ok(None)) => {
                    tracing::debug!("Subprocess stdout closed after {} lines", state.lines_read);
                    stdout_open = false;
                }
                LoopStep::Line(Err(e)) => {
                    tracing::warn!("Error reading subprocess stdout: {}", e);
                    stdout_open = false;
                }
                LoopStep::Exited(Ok(status)) => {
                    tracing::debug!("Subprocess exited with {}", status);
                    exit = Some(status);
                    // Descendants may still hold stdout open; bound the drain
                    drain_until = Some(Instant::now() + self.limits.grace_period);
                }
                LoopStep::Exited(Err(e)) => {
                    return Err(ProcessError::Io(e));
                }
                LoopStep::Deadline => {
                    tracing::warn!(
                        "Subprocess exceeded its {:?} deadline; sending graceful termination",
                        command.timeout.unwrap_or_default()
                    );
                    terminate_child(&mut child, TerminationSignal::Graceful);
                    termination.graceful = true;
                    kill_at = Some(Instant::now() + self.limits.grace_period);
                }
                LoopStep::ForceKill => {
                    tracing::warn!(
                        "Subprocess still running {:?} after graceful termination; killing",
                        self.limits.grace_period
                    );
                    terminate_child(&mut child, TerminationSignal::Forced);
                    termination.forced = true;
                }
                LoopStep::DrainExpired => {
                    tracing::debug!("Stopped draining stdout held open after process exit");
                    stdout_open = false;
                }
            }
        }

        let stderr_tail = match stderr_handle {
            Some(handle) => {
                match tokio::time::timeout(self.limits.grace_period, handle).await {
                    Ok(Ok(tail)) => tail,
                    Ok(Err(e)) => {
                        tracing::debug!("Stderr reader task failed: {}", e);
                        String::new()
                    }
                    Err(_) => {
                        tracing::debug!("Timed out collecting stderr tail");
                        String::new()
                    }
                }
            }
            None => String::new(),
        };

        let status = match exit {
            _ if termination.graceful => ExitStatus::Timeout,
            Some(status) => parse_exit_status(status),
            None => ExitStatus::Error(-1),
        };

        Ok(StreamingOutput {
            status,
            final_result: state.final_result,
            partial_text: state.partial_text,
            stderr_tail,
            lines_read: state.lines_read,
            lines_skipped: state.lines_skipped,
            timed_out: termination.graceful,
            termination,
            duration: start.elapsed(),
        })
    }

    fn handle_line(
        &self,
        raw: RawLine,
        line_number: usize,
        state: &mut ReadState,
        on_event: Option<EventHook<'_>>,
    ) {
        let parsed = match raw {
            RawLine::Complete(line) => {
                let parsed = parse_line(&line, &self.limits.parse);
                if let ParsedLine::Skip(reason) = &parsed {
                    tracing::debug!(
                        "Skipping line {} ({}): {}",
                        line_number,
                        reason,
                        line.chars().take(80).collect::<String>()
                    );
                }
                parsed
            }
            RawLine::Oversized(len) => {
                tracing::warn!(
                    "Skipping line {}: {} bytes exceeds the {} byte limit",
                    line_number,
                    len,
                    self.limits.parse.max_line_bytes
                );
                ParsedLine::Skip(SkipReason::Oversized(len))
            }
        };

        match parsed {
            ParsedLine::Events(events) => {
                for event in events {
                    if state.record(&event) {
                        if let Some(hook) = on_event {
                            hook(&event);
                        }
                    }
                }
            }
            ParsedLine::Skip(_) => state.lines_skipped += 1,
        }
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Read a stream to EOF, keeping only its last `max_bytes`
async fn drain_tail(
    mut stream: impl AsyncRead + Unpin,
    max_bytes: usize,
) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut total = 0usize;

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > max_bytes {
                    let excess = tail.len() - max_bytes;
                    tail.drain(..excess);
                }
            }
            Err(e) => {
                tracing::debug!("Error reading subprocess stderr: {}", e);
                break;
            }
        }
    }

    tracing::trace!("Collected {} bytes of subprocess stderr", total);
    String::from_utf8_lossy(&tail).into_owned()
}
