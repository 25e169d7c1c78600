use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create global config instead of project config"
        )]
        global: bool,
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration with secrets redacted")]
    Show,
    #[command(about = "Show configuration file paths")]
    Path,
}

pub async fn handle_config(
    cmd: ConfigCommand,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<()> {
    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, format),
        ConfigCommand::Show => handle_show(format, config_path),
        ConfigCommand::Path => handle_path(config_path),
    }
}

fn handle_init(global: bool, force: bool, format: OutputFormat) -> Result<()> {
    let path = if global {
        Config::global_path().context("could not determine config directory")?
    } else {
        Config::project_path().context("could not determine project directory")?
    };

    let path = Config::init_at(&path, force)
        .with_context(|| format!("failed to create config at {}", path.display()))?;
    print!(
        "{}",
        get_formatter(format).format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
    let resolved = Config::load_with(config_path)?;
    let config = resolved.config.redacted();

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "config": config,
            "capabilities": resolved.config.capabilities().enabled(),
            "project_path": resolved.project_path,
            "global_path": resolved.global_path,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(ref path) = resolved.project_path {
        println!("# Project config: {}", path.display());
    }
    if let Some(ref path) = resolved.global_path {
        println!("# Global config: {}", path.display());
    }
    let enabled = resolved.config.capabilities().enabled();
    if enabled.is_empty() {
        println!("# Backends: none (keyword search over the local wiki only)");
    } else {
        println!("# Backends: {}", enabled.join(", "));
    }
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn handle_path(config_path: Option<&Path>) -> Result<()> {
    println!("Configuration paths:");
    println!();

    if let Some(path) = config_path {
        println!("Explicit config: {}", path.display());
        return Ok(());
    }

    for (label, path) in [
        ("Project config", Config::project_path()),
        ("Global config", Config::global_path()),
    ] {
        if let Some(path) = path {
            let state = if path.exists() { "active" } else { "would be" };
            println!("{label} ({state}): {}", path.display());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        let state = if env_path.exists() { "active" } else { "would be" };
        println!(".env file ({state}): {}", env_path.display());
    }

    Ok(())
}
