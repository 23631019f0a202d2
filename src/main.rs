//! Lucid agent process - hosts configured components over MQTT

use clap::{Parser, Subcommand};
use lucid_component::agent::ComponentHost;
use lucid_component::config::AgentConfig;
use lucid_component::observability::init_default_logging;
use lucid_component::transport::mqtt::MqttClient;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const INBOUND_CHANNEL_CAPACITY: usize = 100;

/// Lucid agent process
#[derive(Parser)]
#[command(name = "lucid-agent")]
#[command(about = "Hosts Lucid components and routes their MQTT commands")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the broker and run every configured component
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting lucid-agent v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_agent(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(AgentConfig::load_from_file(path)?)
        }
        None => {
            for path_str in ["agent.toml", "config/agent.toml"] {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(AgentConfig::load_from_file(&path)?);
                }
            }

            Err("No configuration file found. Provide one with -c/--config or create agent.toml".into())
        }
    }
}

async fn run_agent(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(agent_id = %config.agent.id, components = config.components.len(), "Agent starting");

    let mut client = MqttClient::new(&config.agent.id, config.mqtt.clone())?;
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
    client.set_inbound_sender(inbound_tx);

    // Recorded before connect so the first ConnAck subscribes it
    let command_filter = lucid_component::protocol::all_commands_filter(&config.agent.base_topic());
    client.subscribe(&command_filter).await?;
    client.connect().await?;

    let client = Arc::new(client);
    let mut host = ComponentHost::from_config(&config, Arc::clone(&client))?;

    let started = host.start_all().await;
    info!(started, total = host.len(), "Components started");

    host.run(inbound_rx, shutdown_signal()).await;

    info!("Application shutdown initiated");
    host.stop_all().await;
    drop(host);

    match Arc::try_unwrap(client) {
        Ok(mut client) => client.disconnect().await?,
        Err(_) => warn!("MQTT client still shared at shutdown, skipping clean disconnect"),
    }

    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

fn handle_config_command(config: AgentConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!(
        agent_id = %config.agent.id,
        components = config.components.len(),
        "Configuration validation complete"
    );
    Ok(())
}
