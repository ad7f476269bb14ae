//! CLI subcommand handlers.

use anyhow::Context;
use quarry_core::config::{QuarryConfig, load_config};
use quarry_core::{
    ConfigValidator, ProviderConfig, ProviderKind, ResearchOrchestrator, SharedConfig,
    TavilySearch, select_backend,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::render::{TerminalObserver, render_report};
use crate::{Commands, ConfigAction};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Research {
            query,
            provider,
            model,
        } => handle_research(&query, provider, model, workspace, quiet).await,
        Commands::Validate => handle_validate(workspace).await,
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load(workspace: &Path) -> anyhow::Result<QuarryConfig> {
    load_config(Some(workspace))
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

/// Apply command-line overrides. Any override invalidates the configuration.
fn apply_overrides(
    config: &mut ProviderConfig,
    provider: Option<ProviderKind>,
    model: Option<String>,
) {
    if let Some(provider) = provider {
        config.set_provider(provider);
    }
    if let Some(model) = model {
        config.set_model(Some(model));
    }
}

fn evidence_source(config: &QuarryConfig) -> anyhow::Result<Arc<TavilySearch>> {
    let search =
        TavilySearch::from_config(&config.search).context("Failed to create search client")?;
    Ok(Arc::new(search))
}

async fn handle_research(
    query: &str,
    provider: Option<ProviderKind>,
    model: Option<String>,
    workspace: &Path,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut config = load(workspace)?;
    apply_overrides(&mut config.provider, provider, model);
    info!(
        workspace = %workspace.display(),
        provider = %config.provider.provider(),
        "Loaded configuration"
    );

    let search = evidence_source(&config)?;
    let validator = ConfigValidator::new(search.clone())
        .with_search_api_key_env(config.search.api_key_env.clone());
    validator
        .check(&mut config.provider)
        .await
        .context("Configuration is not valid; run `quarry validate` for details")?;

    let selection = select_backend(&config.provider, search)?;
    let observer = Arc::new(TerminalObserver::new(quiet));
    let orchestrator =
        ResearchOrchestrator::new(SharedConfig::new(config.provider), observer);

    let result = orchestrator
        .run(query, &selection)
        .await
        .context("Research failed")?;

    println!();
    print!("{}", render_report(&result));
    Ok(())
}

async fn handle_validate(workspace: &Path) -> anyhow::Result<()> {
    let mut config = load(workspace)?;
    let search = evidence_source(&config)?;
    let validator =
        ConfigValidator::new(search).with_search_api_key_env(config.search.api_key_env.clone());

    match validator.check(&mut config.provider).await {
        Ok(()) => {
            println!(
                "Configuration is valid (provider: {}).",
                config.provider.provider()
            );
            Ok(())
        }
        Err(e) => {
            println!(
                "Configuration is not valid (provider: {}).",
                config.provider.provider()
            );
            Err(e.into())
        }
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".quarry");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&QuarryConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let mut config = load(workspace)?;
            config.provider = config.provider.masked();
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
