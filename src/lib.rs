pub mod actions;
pub mod agent_engine;
pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;
pub mod report;

use crate::cli::Cli;
use crate::report::CommandReport;

/// Logs go to stderr; stdout carries only the JSON result envelope.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Loads `.env`, runs the command and returns its report.
pub async fn run(cli: Cli) -> CommandReport {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();
    commands::run(cli).await
}
