//! Quarry CLI: terminal interface for the Quarry research pipeline.
//!
//! Runs one research query per invocation, printing step progress as it
//! happens and the final report at the end.

mod commands;
mod render;

use clap::Parser;
use quarry_core::ProviderKind;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Quarry: provider-agnostic web research from your terminal
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about, long_about = None)]
pub struct Cli {
    /// Workspace directory (holds `.quarry/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Research a question: plan, search each sub-question, synthesize a report
    Research {
        /// The research question
        query: String,

        /// Reasoning backend: gemini, minimax or local
        #[arg(short, long)]
        provider: Option<ProviderKind>,

        /// Model override for the selected backend
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Check that the configured backend is reachable and authenticated
    Validate,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Create a default workspace configuration file
    Init,
    /// Show the effective configuration with credentials masked
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "quarry", "quarry")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "quarry.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.quiet).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_research_with_overrides() {
        let cli = Cli::try_parse_from([
            "quarry",
            "-vv",
            "research",
            "impact of AI on education",
            "--provider",
            "minimax",
            "--model",
            "abab6.5s-chat",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Research {
                query,
                provider,
                model,
            } => {
                assert_eq!(query, "impact of AI on education");
                assert_eq!(provider, Some(ProviderKind::MiniMax));
                assert_eq!(model.as_deref(), Some("abab6.5s-chat"));
            }
            other => panic!("Expected Research, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["quarry", "research", "q", "--provider", "bard"]).is_err());
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::try_parse_from(["quarry", "-w", "/tmp", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
        assert_eq!(cli.workspace, PathBuf::from("/tmp"));
    }
}
