//! Playpen CLI - live TypeScript playground for TypeComposer projects.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "playpen")]
#[command(about = "Edit, bundle and preview TypeComposer projects live")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to playpen.toml config file
    #[arg(short, long, default_value = "playpen.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the starter project and a default config
    Init {
        /// Project directory (defaults to config or "playground")
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Start the playground with live preview
    Dev {
        /// Port to listen on
        #[arg(short, long, default_value = "7777")]
        port: u16,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Compile the project into a standalone preview page
    Build {
        /// Output directory
        #[arg(short, long, default_value = "dist")]
        output: PathBuf,

        /// Entry file (defaults to config, then a search)
        #[arg(short, long)]
        entry: Option<String>,
    },

    /// Serve a built preview
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve
        #[arg(short, long, default_value = "dist")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Init { dir, yes } => {
            commands::init::run(&config, &cli.config, dir, yes).await?;
        }
        Commands::Dev { port, no_open } => {
            commands::dev::run(&config, port, !no_open).await?;
        }
        Commands::Build { output, entry } => {
            commands::build::run(&config, output, entry).await?;
        }
        Commands::Serve { port, dir } => {
            commands::serve::run(port, dir).await?;
        }
    }

    Ok(())
}
