// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use geoframe::Config;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "geoframe")]
#[command(about = "Periodic geotagged frame capture")]
#[command(version)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a session against the synthetic capture stream
    Record {
        /// Recording duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Frame width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Frame height
        #[arg(long, default_value = "720")]
        height: u32,

        /// Latitude to tag frames with (requires --longitude)
        #[arg(long)]
        latitude: Option<f64>,

        /// Longitude to tag frames with (requires --latitude)
        #[arg(long)]
        longitude: Option<f64>,

        /// Output root (default: system pictures directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration
    Info,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=geoframe=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match args.command {
        Commands::Record {
            duration,
            width,
            height,
            latitude,
            longitude,
            output,
        } => {
            cli::record(config, duration, width, height, latitude, longitude, output).await
        }
        Commands::Info => cli::info(config),
    }
}
