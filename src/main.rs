// SPDX-License-Identifier: GPL-3.0-only

use camera_pipeline::FilterType;
use camera_pipeline::config::PipelineConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-pipeline")]
#[command(about = "Orientation-aware capture, preview and recording pipeline")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Configuration file (default: ~/.config/camera-pipeline/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an accelerometer reading and show the resulting frame orientations
    Classify {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        #[arg(allow_hyphen_values = true)]
        z: f64,
    },

    /// Run the pipeline headless on synthetic motion and frames
    Simulate {
        /// Run time in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Record a clip while simulating
        #[arg(short, long)]
        record: bool,

        /// Filters applied to preview and recording (e.g. mono,vignette)
        #[arg(short, long, value_delimiter = ',', value_parser = parse_filter)]
        filter: Vec<FilterType>,

        /// Use the software preview context instead of the GPU
        #[arg(long)]
        software: bool,

        /// Synthetic frame size
        #[arg(long, default_value = "640")]
        width: u32,
        #[arg(long, default_value = "480")]
        height: u32,
    },

    /// Re-encode a video through a filter chain
    Export {
        input: PathBuf,
        output: PathBuf,

        #[arg(short, long, value_delimiter = ',', value_parser = parse_filter)]
        filter: Vec<FilterType>,
    },
}

fn parse_filter(name: &str) -> Result<FilterType, String> {
    FilterType::from_name(name).ok_or_else(|| {
        let known: Vec<_> = FilterType::ALL.iter().map(|f| f.name()).collect();
        format!("unknown filter '{}' (expected one of: {})", name, known.join(", "))
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_pipeline=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let config = match cli.config.or_else(PipelineConfig::default_path) {
        Some(path) => PipelineConfig::load(&path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Classify { x, y, z } => cli::classify(x, y, z),
        Commands::Simulate {
            duration,
            record,
            filter,
            software,
            width,
            height,
        } => cli::simulate(
            config,
            cli::SimulateOptions {
                duration,
                record,
                filters: filter,
                software,
                width,
                height,
            },
        ),
        Commands::Export {
            input,
            output,
            filter,
        } => cli::export(&config, &input, &output, filter),
    }
}
