//! Tests for the streaming runner against real shell subprocesses

use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::subprocess::streaming::{
    EventHook, ParseOptions, StreamEvent, StreamEventKind, StreamLimits, StreamingCommandRunner,
};
use crate::subprocess::{ExitStatus, ProcessCommand, ProcessCommandBuilder, ProcessError};

const TOOL_LINE: &str = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/a/b.go"}}]}}"#;
const TEXT_LINE: &str =
    r#"{"type":"assistant","message":{"content":[{"type":"text","text":"halfway there"}]}}"#;
const RESULT_LINE: &str = r#"{"type":"result","subtype":"success","is_error":false,"result":"done","usage":{"input_tokens":10,"output_tokens":5}}"#;

fn script_command(dir: &TempDir, body: &str, timeout: Option<Duration>) -> ProcessCommand {
    let path = dir.path().join("agent.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{}", body).unwrap();
    ProcessCommandBuilder::new("sh")
        .arg(path.to_str().unwrap())
        .timeout(timeout)
        .build()
}

fn runner(grace: Duration) -> StreamingCommandRunner {
    StreamingCommandRunner::new(StreamLimits {
        grace_period: grace,
        ..StreamLimits::default()
    })
}

#[tokio::test]
async fn test_clean_run_delivers_events_in_order() {
    let dir = TempDir::new().unwrap();
    let body = format!("echo '{TOOL_LINE}'\necho '{TEXT_LINE}'\necho '{RESULT_LINE}'");
    let command = script_command(&dir, &body, None);

    let sink = Mutex::new(Vec::new());
    let record = |event: &StreamEvent| sink.lock().unwrap().push(event.clone());
    let hook: EventHook<'_> = &record;
    let output = runner(Duration::from_secs(1))
        .run_streaming(&command, Some(hook))
        .await
        .unwrap();

    assert_eq!(output.status, ExitStatus::Success);
    assert!(!output.timed_out);
    assert!(output.termination.is_empty());
    assert_eq!(output.lines_read, 3);

    let kinds: Vec<_> = sink.lock().unwrap().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StreamEventKind::ToolUse,
            StreamEventKind::Text,
            StreamEventKind::Result
        ]
    );

    let result = output.final_result.unwrap();
    assert_eq!(result.tokens_in, Some(10));
    assert_eq!(result.tokens_out, Some(5));
    assert_eq!(result.result.unwrap().content, "done");
    assert_eq!(output.partial_text, "halfway there");
}

#[tokio::test]
async fn test_malformed_lines_do_not_stop_the_loop() {
    let dir = TempDir::new().unwrap();
    let body = format!(
        "echo '{{\"type\":\"assistant\",\"message\":{{'\necho 'plain text noise'\necho '{TOOL_LINE}'\necho '{RESULT_LINE}'"
    );
    let command = script_command(&dir, &body, None);

    let sink = Mutex::new(Vec::new());
    let record = |event: &StreamEvent| sink.lock().unwrap().push(event.clone());
    let hook: EventHook<'_> = &record;
    let output = runner(Duration::from_secs(1))
        .run_streaming(&command, Some(hook))
        .await
        .unwrap();

    assert_eq!(output.lines_read, 4);
    assert_eq!(output.lines_skipped, 2);
    let events = sink.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].tool_target, "/a/b.go");
    assert!(output.final_result.is_some());
}

#[tokio::test]
async fn test_oversized_line_is_skipped() {
    let dir = TempDir::new().unwrap();
    let big = "x".repeat(4096);
    let body = format!("echo '{big}'\necho '{RESULT_LINE}'");
    let command = script_command(&dir, &body, None);

    let runner = StreamingCommandRunner::new(StreamLimits {
        parse: ParseOptions {
            max_line_bytes: 1024,
            ..ParseOptions::default()
        },
        ..StreamLimits::default()
    });
    let output = runner.run_streaming(&command, None).await.unwrap();

    assert_eq!(output.lines_skipped, 1);
    assert!(output.final_result.is_some());
}

#[tokio::test]
async fn test_exit_without_result_keeps_partial_output() {
    let dir = TempDir::new().unwrap();
    let body = format!("echo '{TEXT_LINE}'\necho 'boom' >&2\nexit 3");
    let command = script_command(&dir, &body, None);

    let output = runner(Duration::from_secs(1))
        .run_streaming(&command, None)
        .await
        .unwrap();

    assert_eq!(output.status, ExitStatus::Error(3));
    assert!(output.final_result.is_none());
    assert_eq!(output.partial_text, "halfway there");
    assert!(output.stderr_tail.contains("boom"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_deadline_sends_graceful_signal_first() {
    let dir = TempDir::new().unwrap();
    let body = format!(
        "trap 'echo '\"'\"'{RESULT_LINE}'\"'\"'; exit 143' TERM\necho '{TOOL_LINE}'\nsleep 30 &\nwait"
    );
    let command = script_command(&dir, &body, Some(Duration::from_millis(500)));

    let output = runner(Duration::from_secs(5))
        .run_streaming(&command, None)
        .await
        .unwrap();

    assert_eq!(output.status, ExitStatus::Timeout);
    assert!(output.timed_out);
    assert!(output.termination.graceful);
    assert!(!output.termination.forced);
    // The result flushed inside the grace window is still captured
    assert!(output.final_result.is_some());
    assert!(output.duration < Duration::from_secs(5));
}

#[tokio::test]
async fn test_events_arrive_while_process_is_running() {
    let dir = TempDir::new().unwrap();
    let body = format!("echo '{TOOL_LINE}'\nsleep 30");
    let command = script_command(&dir, &body, Some(Duration::from_secs(2)));

    let started = Instant::now();
    let arrivals = Mutex::new(Vec::new());
    let record = |_: &StreamEvent| arrivals.lock().unwrap().push(started.elapsed());
    let hook: EventHook<'_> = &record;
    let output = runner(Duration::from_millis(200))
        .run_streaming(&command, Some(hook))
        .await
        .unwrap();

    // The process only ends once the deadline fires
    assert!(output.timed_out);
    assert!(output.duration >= Duration::from_secs(2));

    let arrivals = arrivals.lock().unwrap();
    assert_eq!(arrivals.len(), 1);
    assert!(
        arrivals[0] < Duration::from_millis(1500),
        "tool event delivered after {:?}",
        arrivals[0]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_deadline_escalates_to_forced_kill() {
    let dir = TempDir::new().unwrap();
    let body = format!("trap '' TERM\necho '{TOOL_LINE}'\nsleep 30 &\nwait");
    let command = script_command(&dir, &body, Some(Duration::from_millis(300)));

    let sink = Mutex::new(Vec::new());
    let record = |event: &StreamEvent| sink.lock().unwrap().push(event.clone());
    let hook: EventHook<'_> = &record;
    let output = runner(Duration::from_millis(300))
        .run_streaming(&command, Some(hook))
        .await
        .unwrap();

    assert_eq!(output.status, ExitStatus::Timeout);
    assert!(output.termination.graceful);
    assert!(output.termination.forced);
    assert!(output.final_result.is_none());
    assert_eq!(sink.lock().unwrap().len(), 1);
    assert!(output.duration < Duration::from_secs(10));
}

#[tokio::test]
async fn test_missing_binary_is_a_spawn_error() {
    let command = ProcessCommandBuilder::new("definitely-not-an-agent-cli-9321").build();
    let err = runner(Duration::from_secs(1))
        .run_streaming(&command, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::CommandNotFound(_)));
}
