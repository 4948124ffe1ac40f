//! tickrelay - Entry Point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tick_feed::ForwardMode;
use tick_relay::app;
use tick_relay::config::CONFIG_ENV;
use tick_relay::AppConfig;
use tracing::info;

/// Live tick fan-out: hub, producer feed and terminal viewer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TICKRELAY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept one producer and relay its messages to all subscribers
    Hub {
        /// Listen port (overrides hub.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the producer command and forward its output to the hub
    Feed {
        /// Hub ingest URL (overrides feed.hub_url)
        #[arg(long)]
        hub_url: Option<String>,
        /// Forward lines verbatim instead of parsed JSON
        #[arg(long)]
        raw: bool,
        /// Producer command and arguments (override feed.command/args)
        #[arg(last = true)]
        producer: Vec<String>,
    },
    /// Show the live option chain
    Watch {
        /// Underlying class to show, empty for all (overrides viewer.class_filter)
        #[arg(long)]
        class: Option<String>,
        /// Expiry to show, e.g. 11JUL24 (overrides viewer.expiry_filter)
        #[arg(long)]
        expiry: Option<String>,
        /// Strike to show (overrides viewer.strike_filter)
        #[arg(long)]
        strike: Option<u32>,
        /// Hub subscriber URL (overrides viewer.hub_url)
        #[arg(long)]
        hub_url: Option<String>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Hub,
    Feed,
    Watch,
}

impl Command {
    /// Apply the command-line overrides and return the role to run.
    fn apply(self, config: &mut AppConfig) -> Role {
        match self {
            Command::Hub { port } => {
                if let Some(port) = port {
                    config.hub.port = port;
                }
                Role::Hub
            }
            Command::Feed {
                hub_url,
                raw,
                producer,
            } => {
                if let Some(url) = hub_url {
                    config.feed.hub_url = url;
                }
                if raw {
                    config.feed.forward = ForwardMode::Raw;
                }
                if let Some((command, args)) = producer.split_first() {
                    config.feed.command = command.clone();
                    config.feed.args = args.to_vec();
                }
                Role::Feed
            }
            Command::Watch {
                class,
                expiry,
                strike,
                hub_url,
            } => {
                if let Some(class) = class {
                    config.viewer.class_filter = class;
                }
                if let Some(expiry) = expiry {
                    config.viewer.expiry_filter = expiry;
                }
                if strike.is_some() {
                    config.viewer.strike_filter = strike;
                }
                if let Some(url) = hub_url {
                    config.viewer.hub_url = url;
                }
                Role::Watch
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config path: CLI arg > TICKRELAY_CONFIG env var > default
    let explicit = args.config.is_some() || std::env::var(CONFIG_ENV).is_ok();
    let config_path = AppConfig::resolve_path(args.config);
    let mut config = if explicit {
        AppConfig::from_file(&config_path)?
    } else {
        AppConfig::load_or_default(&config_path)?
    };

    tick_telemetry::init_logging_with_default(&config.telemetry.log_level)?;
    info!("Starting tickrelay v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, "Configuration loaded");

    let role = args.command.apply(&mut config);
    info!(?role, "Running");

    let shutdown = app::shutdown_on_ctrl_c();
    match role {
        Role::Hub => app::run_hub(&config, shutdown).await?,
        Role::Feed => app::run_feed(&config, shutdown).await?,
        Role::Watch => app::run_watch(&config, shutdown).await?,
    }

    Ok(())
}
