// SPDX-License-Identifier: GPL-3.0-only

use camera_link::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-link")]
#[command(about = "Camera connection, streaming and quality gate tool")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/camera-link/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an end-to-end scenario against a simulated camera
    Simulate {
        /// Device id to connect to
        #[arg(short, long)]
        device: Option<String>,

        /// Streaming duration in seconds
        #[arg(short = 't', long)]
        duration: Option<u64>,

        /// Synthetic frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Simulated connection delay in milliseconds
        #[arg(long)]
        connection_delay_ms: Option<u64>,

        /// Make every connection attempt fail
        #[arg(long)]
        fail: bool,

        /// Number of PTZ commands to issue
        #[arg(long)]
        ptz_commands: Option<usize>,

        /// Write the JSON report to this path
        #[arg(long)]
        json: Option<PathBuf>,

        /// Also save the JSON report under the report directory
        #[arg(long)]
        save_report: bool,
    },

    /// Evaluate the quality gates for given measurements
    Gates {
        /// Connection time in seconds
        #[arg(long, default_value = "0")]
        connection: f64,

        /// Time to first frame in seconds
        #[arg(long, default_value = "0")]
        first_frame: f64,

        /// Average frame rate
        #[arg(long, default_value = "0")]
        fps: f64,

        /// Mean PTZ latency in milliseconds
        #[arg(long, default_value = "0")]
        ptz_ms: f64,

        /// Error count
        #[arg(long, default_value = "0")]
        errors: u64,
    },

    /// Print the effective configuration
    Config {
        /// Print only the configuration file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_link=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let passed = match cli.command {
        Commands::Simulate {
            device,
            duration,
            fps,
            connection_delay_ms,
            fail,
            ptz_commands,
            json,
            save_report,
        } => {
            let options = cli::SimulateOptions {
                device,
                duration,
                fps,
                connection_delay_ms,
                fail,
                ptz_commands,
                json,
                save_report,
            };
            cli::simulate(config, options).await?
        }
        Commands::Gates {
            connection,
            first_frame,
            fps,
            ptz_ms,
            errors,
        } => cli::evaluate_gates(&config, connection, first_frame, fps, ptz_ms, errors)?,
        Commands::Config { path } => {
            cli::show_config(&config, cli.config.as_deref(), path)?;
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
