//! Config command - manage configuration.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use mrzscan_core::ScanConfig;

use super::config_file;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "engine.blur_percentage")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_file(config_path);
    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(init_args, path),
        ConfigCommand::Get { key } => get_config(&path, &key),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
        ConfigCommand::Path => show_path(&path),
    }
}

fn read_or_default(path: &PathBuf) -> anyhow::Result<ScanConfig> {
    if path.exists() {
        Ok(ScanConfig::from_file(path)?)
    } else {
        Ok(ScanConfig::default())
    }
}

fn show_config(path: &PathBuf) -> anyhow::Result<()> {
    if !path.exists() {
        eprintln!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        );
    }
    let config = read_or_default(path)?;

    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn init_config(args: InitArgs, default_path: PathBuf) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or(default_path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    ScanConfig::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

fn get_config(path: &PathBuf, key: &str) -> anyhow::Result<()> {
    let config = read_or_default(path)?;
    let value = config.get(key)?;

    println!("{}", serde_json::to_string_pretty(&value)?);

    Ok(())
}

fn set_config(path: &PathBuf, key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = read_or_default(path)?;
    config.set(key, value)?;
    config.save(path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&config.get(key)?)?
    );

    Ok(())
}

fn show_path(path: &PathBuf) -> anyhow::Result<()> {
    println!("Configuration file: {}", path.display());

    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'mrzscan config init' to create a configuration file.");
    }

    Ok(())
}
