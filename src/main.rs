//! Command-line entry point.
//!
//! `restflow <file> [request]` runs one named request from a request
//! file and prints its formatted outcome. All flags feed the base
//! execution config; `@cfg.*` overrides in the file win over them.

use clap::Parser;
use restflow::engine::{Engine, ExecutionConfig};
use restflow::executor::ReqwestTransport;
use restflow::formatter::{format_outcome, OutputMode};
use restflow::parser::parse;
use restflow::shell::SystemShell;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "restflow", version, about = "Run scripted HTTP request files")]
struct Cli {
    /// Request file to interpret.
    file: String,

    /// Name of the request to run.
    #[arg(default_value = "main")]
    request: String,

    /// Show full request and response detail.
    #[arg(short = 'a', long = "all")]
    all: bool,

    /// Timeout in milliseconds for network calls and shell commands.
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip TLS certificate verification.
    #[arg(long)]
    insecure: bool,

    /// Proxy URL for outgoing requests.
    #[arg(long)]
    proxy: Option<String>,

    /// Resolve and substitute but skip the network call.
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Maximum nested send depth.
    #[arg(long = "max-depth")]
    max_depth: Option<usize>,
}

/// A failed run: the message for stderr, plus any output the hooks had
/// already produced. That output still reaches stdout; it is never
/// retracted by a later failure.
struct Failure {
    partial: Option<String>,
    message: String,
}

impl Failure {
    fn message(message: String) -> Self {
        Self {
            partial: None,
            message,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            if let Some(partial) = failure.partial {
                if !partial.is_empty() {
                    println!("{}", partial);
                }
            }
            eprintln!("error: {}", failure.message);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, Failure> {
    let text = std::fs::read_to_string(&cli.file)
        .map_err(|e| Failure::message(format!("cannot read '{}': {}", cli.file, e)))?;

    let document = parse(&text).map_err(|e| Failure::message(e.to_string()))?;

    let defaults = ExecutionConfig::default();
    let config = ExecutionConfig {
        timeout_ms: cli.timeout.unwrap_or(defaults.timeout_ms),
        insecure: cli.insecure,
        proxy: cli.proxy.clone(),
        dry_run: cli.dry_run,
        max_send_depth: cli.max_depth.unwrap_or(defaults.max_send_depth),
    };

    let mut engine = Engine::new(
        &document,
        Box::new(ReqwestTransport::new()),
        Box::new(SystemShell::new()),
        config,
    );

    let mode = if cli.all {
        OutputMode::Verbose
    } else {
        OutputMode::Terse
    };

    match engine.execute(&cli.request) {
        Ok(outcome) => Ok(format_outcome(&outcome, mode)),
        Err(failure) => Err(Failure {
            partial: Some(format_outcome(&failure.partial, mode)),
            message: failure.error.to_string(),
        }),
    }
}
