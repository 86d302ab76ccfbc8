use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

use stepstream::config::load_config;
use stepstream::event::{display_for, DisplayMode, EventEmitter, ProgressEmitter, StepIdentity};
use stepstream::{ClaudeAdapter, StepExecutor, StepRequest, StreamError, ThrottledProgressEmitter};

/// Stream agent CLI activity as pipeline events
#[derive(Parser)]
#[command(name = "stepstream")]
#[command(about = "Run agent steps with real-time event streaming", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one step through the Claude adapter
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Prompt handed to the agent
    prompt: String,

    /// Pipeline identifier (random when omitted)
    #[arg(long)]
    pipeline_id: Option<String>,

    /// Step identifier
    #[arg(long, default_value = "step")]
    step_id: String,

    /// Persona label shown alongside the step
    #[arg(long, default_value = "")]
    persona: String,

    /// Model passed to the agent CLI
    #[arg(short, long)]
    model: Option<String>,

    /// Step deadline, e.g. "90s" or "10m"
    #[arg(short, long, value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Working directory for the agent process
    #[arg(short = 'C', long)]
    working_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Human display on stderr
    #[arg(long, value_enum, default_value_t = DisplayMode::Rich)]
    display: DisplayMode,
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Stdout carries the event stream
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("stepstream started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Run(args) => run_step(args).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            match e.downcast_ref::<StreamError>() {
                Some(err) => {
                    eprintln!("Error: {}", err.user_message());
                    std::process::exit(err.exit_code());
                }
                None => {
                    eprintln!("Error: {e:#}");
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Returns whether the step succeeded
async fn run_step(args: RunArgs) -> anyhow::Result<bool> {
    let config = load_config(args.config.as_deref())
        .await
        .map_err(StreamError::from)?;

    let throttle = Arc::new(ThrottledProgressEmitter::new(
        display_for(args.display),
        config.throttle_interval,
    ));
    let flush_timer = Arc::clone(&throttle).start_flush_timer();

    let display: Arc<dyn ProgressEmitter> = throttle.clone();
    let emitter = Arc::new(EventEmitter::stdout(Some(display)));
    let adapter = ClaudeAdapter::new(config.claude_binary.clone(), config.stream_limits())
        .with_default_timeout(config.step_timeout);
    let executor = StepExecutor::new(Arc::new(adapter), Arc::clone(&emitter))
        .with_heartbeat(config.heartbeat());

    let pipeline_id = args
        .pipeline_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let request = StepRequest {
        identity: StepIdentity::new(pipeline_id, args.step_id, args.persona),
        prompt: args.prompt,
        model: args.model,
        timeout: args.timeout,
        working_dir: args.working_dir,
        ..Default::default()
    };

    let outcome = executor.execute(&request).await;

    flush_timer.abort();
    throttle.flush().context("Failed to flush display")?;
    emitter.flush()?;

    let result = outcome
        .map_err(StreamError::from)
        .context("Step could not be started")?;
    Ok(result.is_success())
}
