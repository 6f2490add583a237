//! automapper CLI - Command-line interface
//!
//! Inspects and imports `.hmap` map exports using the automapper library.

mod commands;
mod error;

use automapper::config::{config_file_path, ConfigFile};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::config::ConfigCommands;
use commands::import::ImportArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "automapper")]
#[command(version, about = "Import game map exports into a tile pyramid", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.automapper/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a map export and print its contents
    Inspect {
        /// Map export (.hmap) to read
        file: PathBuf,

        /// Number of largest segments that would be imported
        #[arg(long)]
        max_segments: Option<usize>,
    },

    /// Import a map export
    Import(ImportArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    match cli.command {
        Commands::Inspect { file, max_segments } => commands::inspect::run(&file, max_segments),
        Commands::Import(args) => {
            let config = ConfigFile::load_from(&config_path)?;
            commands::import::run(args, config).await
        }
        Commands::Config(command) => commands::config::run(command, &config_path),
    }
}
