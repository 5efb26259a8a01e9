mod commands;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use omnical_core::config::{MappingConfig, OmnicalConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "omnical")]
#[command(about = "Keep pairs of remote calendars in sync")]
struct Cli {
    /// Log engine decisions (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured mapping once
    Sync {
        /// Only run this mapping (index shown by `omnical config`)
        #[arg(short, long)]
        mapping: Option<usize>,

        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show pending changes for each mapping
    Status {
        /// Only check this mapping
        #[arg(short, long)]
        mapping: Option<usize>,
    },
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    init_logging(verbose);

    match cli.command {
        Commands::Sync { mapping, dry_run } => {
            let config = load_config()?;
            let mappings = select_mappings(&config, mapping)?;
            if dry_run {
                commands::status::run(&config, mappings, verbose).await
            } else {
                commands::sync::run(&config, mappings).await
            }
        }
        Commands::Status { mapping } => {
            let config = load_config()?;
            let mappings = select_mappings(&config, mapping)?;
            commands::status::run(&config, mappings, verbose).await
        }
        Commands::Config => commands::config::run(),
    }
}

/// Logs go to stderr so stdout stays clean for rendered output.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config() -> Result<OmnicalConfig> {
    let path = OmnicalConfig::config_path()?;
    OmnicalConfig::load_from(&path)
        .with_context(|| format!("Could not load configuration from {}", path.display()))
}

fn select_mappings(
    config: &OmnicalConfig,
    index: Option<usize>,
) -> Result<Vec<(usize, &MappingConfig)>> {
    match index {
        Some(i) => match config.mappings.get(i) {
            Some(mapping) => Ok(vec![(i, mapping)]),
            None => anyhow::bail!(
                "Mapping {} not found. Available: 0..{}",
                i,
                config.mappings.len()
            ),
        },
        None => Ok(config.mappings.iter().enumerate().collect()),
    }
}
