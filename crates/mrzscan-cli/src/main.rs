//! CLI application for MRZ document scanning.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, crop, mrz, scan};

/// MRZ scanner - crop camera frames and read machine readable zones
#[derive(Parser)]
#[command(name = "mrzscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut the viewfinder area out of a camera frame
    Crop(crop::CropArgs),

    /// Replay image files as camera frames through the scanner
    Scan(scan::ScanArgs),

    /// Parse MRZ text and verify its check digits
    Mrz(mrz::MrzArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Crop(args) => crop::run(args, config_path).await,
        Commands::Scan(args) => scan::run(args, config_path).await,
        Commands::Mrz(args) => mrz::run(args).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
