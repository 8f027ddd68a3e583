//! `vstep` command line tool.

mod args;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::Cli;

const DEFAULT_LOG_FILTER: &str = "vstep=info";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing();

    commands::run(cli).await
}

/// Colored output for terminals, JSON when `LOG_FORMAT=json`. Logs go to
/// stderr so command output on stdout stays machine readable.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

/// Filter from `RUST_LOG`, or `vstep=info` when unset or unparsable.
fn env_filter(directives: Option<String>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;
    use tracing_subscriber::prelude::*;

    fn client_debug_enabled(filter: EnvFilter) -> bool {
        let subscriber = tracing_subscriber::registry().with(filter);
        tracing::subscriber::with_default(subscriber, || {
            tracing::enabled!(target: "vstep_client::client", Level::DEBUG)
        })
    }

    fn cli_info_enabled(filter: EnvFilter) -> bool {
        let subscriber = tracing_subscriber::registry().with(filter);
        tracing::subscriber::with_default(subscriber, || {
            tracing::enabled!(target: "vstep::commands", Level::INFO)
        })
    }

    #[test]
    fn test_rust_log_enables_client_debug() {
        assert!(client_debug_enabled(env_filter(Some("vstep_client=debug".to_string()))));
        assert!(client_debug_enabled(env_filter(Some("debug".to_string()))));
    }

    #[test]
    fn test_default_filter() {
        assert!(!client_debug_enabled(env_filter(None)));
        assert!(cli_info_enabled(env_filter(None)));
        assert!(cli_info_enabled(env_filter(Some("  ".to_string()))));
    }
}
