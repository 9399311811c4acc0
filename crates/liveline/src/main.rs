//! liveline - watch and drive a live session from the terminal
//!
//! Subcommands:
//! - `liveline watch [endpoint]` - Mirror the session and log every event
//! - `liveline set <path> <value>` - Set a numeric parameter
//! - `liveline prop <path> <property> <value>` - Set a track or transport property
//! - `liveline call <path> <method> [args...]` - Invoke a method on an entity
//! - `liveline config` - Print the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use liveconf::{expand_path, LiveConfig};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "liveline")]
#[command(about = "Live session mirror and remote control")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./liveline.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// How long writes wait for the connection, and for confirmation
    #[arg(long, global = true, default_value = "3000")]
    wait_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and log session, delta, status and latency events until Ctrl-C
    Watch {
        /// WebSocket endpoint (defaults to the configured one)
        endpoint: Option<String>,
    },

    /// Set a numeric leaf (e.g. track0.vol, track1.device0.param2)
    Set {
        path: String,
        value: f64,
    },

    /// Set a named property (e.g. track0 mute true, transport tempo 128)
    Prop {
        path: String,
        property: String,
        value: String,
    },

    /// Invoke a method on the entity at path
    Call {
        path: String,
        method: String,

        /// Arguments, each parsed as JSON and falling back to a string
        args: Vec<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_deref().map(expand_path);
    let (config, sources) = LiveConfig::load_with_sources_from(config_path.as_deref())
        .context("Failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.telemetry.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for file in &sources.files {
        tracing::debug!("Loaded config from {}", file.display());
    }
    for var in &sources.env_overrides {
        tracing::debug!("Config overridden by {}", var);
    }

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml());
        return Ok(());
    }

    let client = livesync::init(&config)?;
    let wait = std::time::Duration::from_millis(cli.wait_ms);

    match cli.command {
        Commands::Watch { endpoint } => {
            commands::watch(client, endpoint.as_deref()).await?;
        }
        Commands::Set { path, value } => {
            commands::set(client, &path, value, wait).await?;
        }
        Commands::Prop {
            path,
            property,
            value,
        } => {
            commands::prop(client, &path, &property, &value, wait).await?;
        }
        Commands::Call { path, method, args } => {
            commands::call(client, &path, &method, &args, wait).await?;
        }
        Commands::Config => {}
    }

    Ok(())
}
