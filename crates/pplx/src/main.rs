//! pplx - query Perplexity from the terminal or from an MCP client.
//!
//! Main entry point for the pplx CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::Style;

mod commands;

use commands::{config, mcp, query};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// pplx - web-grounded answers from Perplexity
#[derive(Parser)]
#[command(name = "pplx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Load this config file instead of discovering one
    #[arg(long, global = true, env = "PPLX_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a question
    #[command(visible_alias = "q")]
    Query(query::QueryArgs),

    /// Serve the perplexity_query tool over MCP stdio
    Mcp(mcp::McpArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Exit Codes
// ─────────────────────────────────────────────────────────────────────────────

const EXIT_OTHER: u8 = 1;
const EXIT_BAD_INPUT: u8 = 2;
const EXIT_REMOTE: u8 = 3;
const EXIT_IO: u8 = 4;

/// Map the root cause of a failure to an exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<pplx_core::Error>() {
            return match e {
                pplx_core::Error::Request(transport) => transport_exit_code(transport),
                e if e.is_input_error() => EXIT_BAD_INPUT,
                _ => EXIT_REMOTE,
            };
        }
        if let Some(e) = cause.downcast_ref::<pplx_config::ConfigError>() {
            return match e {
                pplx_config::ConfigError::ApiKeyNotFound { .. } => EXIT_BAD_INPUT,
                _ => EXIT_IO,
            };
        }
        if let Some(e) = cause.downcast_ref::<pplx_core::TransportError>() {
            return transport_exit_code(e);
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return EXIT_IO;
        }
    }
    EXIT_OTHER
}

/// A client that could not be built from its settings is a local mistake.
fn transport_exit_code(err: &pplx_core::TransportError) -> u8 {
    match err {
        pplx_core::TransportError::Config(_) => EXIT_BAD_INPUT,
        _ => EXIT_REMOTE,
    }
}

/// Everything our crates log at trace goes to the file.
const FILE_LOG_FILTER: &str =
    "pplx=trace,pplx_core=trace,pplx_client=trace,pplx_config=trace,pplx_mcp=trace,info";

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Console (stderr, human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "pplx=debug,pplx_core=debug,pplx_client=debug,pplx_config=debug,pplx_mcp=debug,info"
    } else {
        "pplx=info,pplx_core=info,pplx_client=info,pplx_config=info,pplx_mcp=info,warn"
    };
    let console_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|directives| tracing_subscriber::EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new(filter));

    let log_dir = pplx_config::log_dir().unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "pplx.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(FILE_LOG_FILTER)),
        )
        .init();

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_path: cli.config,
    };

    let outcome = match cli.command {
        Commands::Query(args) => query::run(args, &ctx).await,
        Commands::Mcp(args) => mcp::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code(&e);
            tracing::debug!(error = ?e, code, "Command failed");
            let red = Style::new().red().for_stderr();
            eprintln!("{} {:#}", red.apply_to("Error:"), e);
            ExitCode::from(code)
        }
    }
}
