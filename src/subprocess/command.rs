use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ProcessError;

#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub stdin: Option<String>,
}

impl ProcessCommand {
    /// Render the command line for logs and error messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Timeout,
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "exit code 0"),
            ExitStatus::Error(code) => write!(f, "exit code {}", code),
            ExitStatus::Timeout => write!(f, "timed out"),
            ExitStatus::Signal(signal) => write!(f, "terminated by signal {}", signal),
        }
    }
}

/// Convert process exit status to our ExitStatus enum
pub(crate) fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
    if status.success() {
        ExitStatus::Success
    } else if let Some(code) = status.code() {
        ExitStatus::Error(code)
    } else {
        parse_signal_status(status)
    }
}

#[cfg(unix)]
fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
        ExitStatus::Signal(signal)
    } else {
        ExitStatus::Error(1)
    }
}

#[cfg(not(unix))]
fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
    ExitStatus::Error(1)
}

/// Log command execution details
fn log_command_start(command: &ProcessCommand) {
    tracing::debug!(
        "Executing subprocess: {} ({} args)",
        command.program,
        command.args.len()
    );

    if !command.env.is_empty() {
        tracing::trace!("Environment overrides: {:?}", command.env.keys());
    }

    if let Some(ref dir) = command.working_dir {
        tracing::trace!("Working directory: {:?}", dir);
    }

    if let Some(ref stdin) = command.stdin {
        tracing::trace!("Stdin provided: {} bytes", stdin.len());
    }
}

/// Configure the tokio command with args, environment, working directory and pipes
fn configure_command(command: &ProcessCommand) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(&command.program);

    // New process group so termination signals reach the whole subprocess tree
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    cmd.args(&command.args);

    for (key, value) in &command.env {
        cmd.env(key, value);
    }

    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }

    cmd.stdin(if command.stdin.is_some() {
        std::process::Stdio::piped()
    } else {
        std::process::Stdio::null()
    });
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    cmd.kill_on_drop(true);
    cmd
}

/// Map spawn error to ProcessError
fn map_spawn_error(error: std::io::Error, command: &ProcessCommand) -> ProcessError {
    if error.kind() == std::io::ErrorKind::NotFound {
        ProcessError::CommandNotFound(command.program.clone())
    } else {
        ProcessError::SpawnFailed {
            command: command.display(),
            source: error,
        }
    }
}

/// Write stdin data to the child process and close the pipe
async fn write_stdin(
    child: &mut tokio::process::Child,
    stdin_data: &str,
) -> Result<(), ProcessError> {
    if let Some(mut stdin) = child.stdin.take() {
        use tokio::io::AsyncWriteExt;
        stdin.write_all(stdin_data.as_bytes()).await?;
        stdin.shutdown().await?;
    }
    Ok(())
}

/// Spawn and configure a process, feeding stdin if provided
pub(crate) async fn spawn_configured_process(
    command: &ProcessCommand,
) -> Result<tokio::process::Child, ProcessError> {
    log_command_start(command);

    let mut cmd = configure_command(command);
    let mut child = cmd.spawn().map_err(|e| {
        tracing::error!(
            "Failed to spawn '{}': {:?} (kind: {:?})",
            command.program,
            e,
            e.kind()
        );
        map_spawn_error(e, command)
    })?;

    if let Some(stdin_data) = &command.stdin {
        write_stdin(&mut child, stdin_data).await?;
    }

    Ok(child)
}

/// Extract a stream from a child process, converting None to error
pub(crate) fn extract_stream<T>(stream: Option<T>, stream_name: &str) -> Result<T, ProcessError> {
    stream.ok_or_else(|| ProcessError::InternalError {
        message: format!("Failed to capture {}", stream_name),
    })
}
