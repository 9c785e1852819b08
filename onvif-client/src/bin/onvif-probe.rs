use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use onvif_client::{ClientConfig, OnvifDevice, PtzCommand, ReqwestTransport};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "onvif-probe")]
#[command(about = "Query stream URIs and drive PTZ on ONVIF cameras")]
#[command(version)]
struct Args {
    /// Device host or host:port
    #[arg(short, long)]
    address: String,

    #[arg(short, long, default_value = "admin")]
    user: String,

    #[arg(short, long)]
    password: String,

    /// Path to client config (TOML); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log request flow at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the stream URI of the first media profile
    StreamUri,

    /// Start a continuous PTZ move
    Move {
        /// left, right, up, down, zoom_in, zoom_out or stop
        command: PtzCommand,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match &args.config {
        Some(path) => ClientConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ClientConfig::default(),
    };

    let transport = ReqwestTransport::new(&config).context("Failed to create HTTP client")?;
    let device = OnvifDevice::new(Arc::new(transport), config);
    device.set_auth(&args.user, &args.password, &args.address);

    match args.command {
        Commands::StreamUri => {
            let uri = device
                .get_media_stream_uri()
                .with_context(|| format!("Failed to get stream URI from {}", args.address))?;
            println!("{}", uri);
        }
        Commands::Move { command } => {
            device
                .continuous_move(command)
                .with_context(|| format!("Failed to move {} on {}", command, args.address))?;
            println!("Moving {}", command);
        }
    }

    Ok(())
}
