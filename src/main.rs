//! Distance telemetry agent - Main Entry Point
//!
//! Wires the host-side collaborators (Linux link driver, rumqttc broker
//! client, configured sensor) into the connectivity supervisor and runs it
//! until the process is told to stop.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

use distance_agent::config::AgentConfig;
use distance_agent::link::host::HostLinkDriver;
use distance_agent::link::{LinkManager, PollPolicy};
use distance_agent::observability::init_default_logging;
use distance_agent::sensor::{DistanceSensor, SimulatedSensor};
use distance_agent::session::rumqtt::RumqttBroker;
use distance_agent::session::SessionManager;
use distance_agent::supervisor::{Supervisor, SupervisorPolicy};

/// Single-board distance telemetry agent
#[derive(Parser)]
#[command(name = "distance-agent")]
#[command(about = "Distance telemetry agent with resilient MQTT delivery")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!(
        "Starting distance telemetry agent v{}",
        env!("CARGO_PKG_VERSION")
    );

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

    info!("Agent shutdown complete");
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
            // Try default locations
            let default_paths = vec!["agent.toml", "config/agent.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(AgentConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create agent.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_agent(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(device = %config.device.name, topic = %config.mqtt.topic, "agent starting");

    let mut supervisor = build_supervisor(&config)?;

    tokio::select! {
        result = supervisor.run() => {
            // Only a bounded retry policy can get here; the defaults never do.
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down");
        }
    }

    Ok(())
}

/// Sensor factory - selects the configured sensor driver
struct SensorFactory;

impl SensorFactory {
    fn create(config: &AgentConfig) -> Result<Box<dyn DistanceSensor>, Box<dyn std::error::Error>> {
        match config.sensor.driver.as_str() {
            "simulated" => {
                info!(
                    trig_pin = config.sensor.trig_pin,
                    echo_pin = config.sensor.echo_pin,
                    "using simulated sensor (no hardware attached)"
                );
                Ok(Box::new(SimulatedSensor::new()))
            }
            driver => Err(format!("Unsupported sensor driver: {driver}").into()),
        }
    }
}

/// Bootstrap factory - creates the supervisor with injected collaborators
fn build_supervisor(
    config: &AgentConfig,
) -> Result<
    Supervisor<HostLinkDriver, RumqttBroker, Box<dyn DistanceSensor>>,
    Box<dyn std::error::Error>,
> {
    let driver = HostLinkDriver::new(&config.wifi.interface);
    let link = LinkManager::new(
        driver,
        config.wifi.ssid.clone(),
        config.wifi.auth_mode,
        config.get_wifi_password()?,
        PollPolicy::from_config(&config.wifi),
    );

    let broker = RumqttBroker::new(
        &config.mqtt,
        config.get_mqtt_username(),
        config.get_mqtt_password(),
    );
    let session = SessionManager::new(broker);

    let sensor = SensorFactory::create(config)?;

    Ok(Supervisor::new(
        link,
        session,
        sensor,
        config.device.name.clone(),
        config.mqtt.topic.clone(),
        SupervisorPolicy::from_config(config),
    ))
}

fn handle_config_command(
    config: AgentConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
