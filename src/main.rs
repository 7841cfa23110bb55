// SPDX-License-Identifier: GPL-3.0-only

use camera_controls::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-controls")]
#[command(about = "Negotiate camera capabilities and settings")]
#[command(version)]
struct Cli {
    /// JSON file with virtual device profiles (default: built-in profiles)
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Engine config file (default: <config dir>/camera-controls/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Show the capabilities of a camera
    Capabilities {
        /// Camera index to use (from 'camera-controls list')
        #[arg(short, long, default_value = "0")]
        camera: usize,
    },

    /// Apply settings and print the result
    Apply {
        /// Camera index to use (from 'camera-controls list')
        #[arg(short, long, default_value = "0")]
        camera: usize,

        /// Setting to change, e.g. `focusDistance=0.3`; `null` clears it
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Take a snapshot
    Snapshot {
        /// Camera index to use (from 'camera-controls list')
        #[arg(short, long, default_value = "0")]
        camera: usize,

        /// Output file or directory (default: ~/Pictures/Camera Controls/IMG_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Setting to apply before capturing
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };

    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_controls=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    let context = cli::Context::new(cli.profile.as_deref(), config)?;

    runtime.block_on(async {
        let result = match cli.command {
            Commands::List => cli::list_cameras(&context).await,
            Commands::Capabilities { camera } => cli::show_capabilities(&context, camera).await,
            Commands::Apply { camera, set } => cli::apply_settings(&context, camera, &set).await,
            Commands::Snapshot {
                camera,
                output,
                set,
            } => cli::take_snapshot(&context, camera, output, &set).await,
        };
        context.supervisor.teardown().await;
        result
    })
}
