//! cloudiot-device - Main Entry Point
//!
//! Connects to the MQTT bridge, publishes telemetry and applies
//! configuration updates until the configured number of messages is sent
//! or the process is interrupted.

use clap::{Parser, Subcommand};
use cloudiot_device::cli::{load_configuration, CliOverrides};
use cloudiot_device::config::DeviceConfig;
use cloudiot_device::device::{DeviceLifecycle, LogIndicator, SimulatedSensors};
use cloudiot_device::observability::init_logging_with_verbosity;
use cloudiot_device::peripheral::PeripheralReader;
use cloudiot_device::{create_jwt, DeviceResult, MqttClient};
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info};

/// Example Google Cloud IoT Core MQTT device connection code
#[derive(Parser)]
#[command(name = "cloudiot-device")]
#[command(about = "Example Google Cloud IoT Core MQTT device connection code")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    overrides: CliOverrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and publish telemetry (default)
    Run,
    /// Validate configuration
    Config {
        /// Show the merged configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging_with_verbosity(cli.verbose);

    info!("Starting cloudiot-device v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref(), &cli.overrides) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_device(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run_device(config: DeviceConfig) -> DeviceResult<()> {
    info!("Device starting as {}", config.client_id());

    let token = create_jwt(
        &config.device.project_id,
        &config.auth.private_key_file,
        config.auth.algorithm,
    )?;
    let transport = MqttClient::new(&config, &token)?;
    let peripheral = PeripheralReader::from_config(&config.peripheral)?;

    let lifecycle = DeviceLifecycle::new(
        config,
        transport,
        Box::new(SimulatedSensors::new()),
        peripheral,
        Box::new(LogIndicator),
    );

    let summary = lifecycle.run_until(shutdown_signal()).await?;
    info!(
        messages_published = summary.messages_published,
        publish_failures = summary.publish_failures,
        "Finished loop successfully. Goodbye!"
    );
    Ok(())
}

/// Completes on SIGINT or SIGTERM
async fn shutdown_signal() {
    let sigint = signal::unix::signal(signal::unix::SignalKind::interrupt());
    let sigterm = signal::unix::signal(signal::unix::SignalKind::terminate());

    match (sigint, sigterm) {
        (Ok(mut sigint), Ok(mut sigterm)) => {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }
        _ => {
            error!("Failed to install signal handlers, falling back to Ctrl-C");
            if signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, shutting down gracefully...");
            }
        }
    }
}

fn handle_config_command(config: DeviceConfig, show: bool) -> DeviceResult<()> {
    if show {
        println!("Current configuration:");
        println!("{}", config.to_toml()?);
    }

    info!("Configuration validation complete");
    Ok(())
}
