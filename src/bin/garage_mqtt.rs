//! Raspberry Pi daemon bridging garage doors to Home Assistant over MQTT.
//!
//! Broker settings come from the environment (optionally loaded from an env
//! file) or the command line:
//!
//! ```text
//! MQTT_BROKER=192.168.1.10
//! MQTT_PORT=1883
//! MQTT_USERNAME=garage
//! MQTT_PASSWORD=secret
//! ```
//!
//! Doors default to the two-door reference wiring. Pass `--doors doors.toml`
//! to describe a different installation:
//!
//! ```toml
//! [[door]]
//! id = "tor_mitte"
//! name = "Tor Mitte"
//! relay_pin = 16
//! open_pin = 27
//! closed_pin = 22
//! ```
//!
//! Run with `cargo run --features rpi --bin garage_mqtt`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::hal::Delay;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use garage_cover::hal::{GpioDoor, Polarity};
use garage_cover::services::{GarageMqttHandler, MqttRuntimeConfig, SharedGarageState};
use garage_cover::{Config, DoorConfig, DoorController, GarageConfig, MqttConfig, TopicConfig};

/// Env file read before argument parsing, unless `GARAGE_ENV_FILE` names another.
const DEFAULT_ENV_FILE: &str = "/home/pi/.garage_mqtt.env";

type PiDoor = GpioDoor<InputPin, OutputPin, Delay>;

/// Garage door MQTT bridge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    host: String,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    port: u16,

    /// MQTT username
    #[arg(long, env = "MQTT_USERNAME")]
    username: Option<String>,

    /// MQTT password
    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// MQTT client id
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "garage_pi")]
    client_id: String,

    /// Prefix for command and state topics
    #[arg(long, default_value = "garage")]
    topic_base: String,

    /// Home Assistant discovery prefix
    #[arg(long, default_value = "homeassistant")]
    discovery_prefix: String,

    /// Sensor polling interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    poll_interval_ms: u32,

    /// TOML file describing the doors
    #[arg(long)]
    doors: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting garage MQTT bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = build_config(&args)?;
    let doors = open_doors(&config.garage)?;
    let state = Arc::new(SharedGarageState::new(doors));
    let handler = GarageMqttHandler::new(state, MqttRuntimeConfig::from_config(&config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut bridge = tokio::spawn(handler.run(shutdown_rx));

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            None
        }
        result = &mut bridge => Some(result),
    };
    let result = match finished {
        Some(result) => result,
        None => bridge.await,
    };
    // Dropping the handler released every relay
    result.context("MQTT task failed")??;

    info!("Garage MQTT bridge stopped");
    Ok(())
}

fn load_env_file() {
    let path = std::env::var("GARAGE_ENV_FILE").unwrap_or_else(|_| DEFAULT_ENV_FILE.to_string());
    // A missing file is fine: the variables may come from the service manager
    let _ = dotenvy::from_path(&path);
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(())
}

fn build_config(args: &Args) -> Result<Config> {
    let mut mqtt = MqttConfig::default()
        .with_host(&args.host)
        .with_port(args.port)
        .with_client_id(&args.client_id)
        .with_poll_interval_ms(args.poll_interval_ms);
    if let Some(username) = &args.username {
        mqtt = mqtt.with_auth(username, args.password.as_deref().unwrap_or_default());
    }

    let topics = TopicConfig::default()
        .with_base(&args.topic_base)
        .with_discovery_prefix(&args.discovery_prefix);

    let garage = match &args.doors {
        Some(path) => load_doors(path)?,
        None => GarageConfig::default(),
    };
    let config = Config::default()
        .with_mqtt(mqtt)
        .with_topics(topics)
        .with_garage(garage);
    config.validate().context("invalid door configuration")?;

    Ok(config)
}

fn load_doors(path: &Path) -> Result<GarageConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read doors file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse doors file {}", path.display()))
}

fn open_doors(garage: &GarageConfig) -> Result<Vec<DoorController<PiDoor>>> {
    let gpio = Gpio::new().context("failed to open GPIO")?;
    garage
        .doors
        .iter()
        .map(|door| {
            let hardware = open_door(&gpio, door)?;
            info!(
                door = %door.id,
                relay = door.relay_pin,
                open = door.open_pin,
                closed = door.closed_pin,
                "door configured"
            );
            Ok(DoorController::new(door.clone(), hardware))
        })
        .collect()
}

fn open_door(gpio: &Gpio, door: &DoorConfig) -> Result<PiDoor> {
    let pin = |n: u8| {
        gpio.get(n)
            .with_context(|| format!("door {}: GPIO {} unavailable", door.id, n))
    };

    // Bias inputs towards the released level
    let input = |n: u8| -> Result<InputPin> {
        Ok(match door.sensor_polarity {
            Polarity::ActiveLow => pin(n)?.into_input_pullup(),
            Polarity::ActiveHigh => pin(n)?.into_input_pulldown(),
        })
    };
    let open = input(door.open_pin)?;
    let closed = input(door.closed_pin)?;

    // Start with the relay released
    let relay = match door.relay_polarity {
        Polarity::ActiveLow => pin(door.relay_pin)?.into_output_high(),
        Polarity::ActiveHigh => pin(door.relay_pin)?.into_output_low(),
    };

    Ok(GpioDoor::new(open, closed, relay, Delay::new())
        .with_sensor_polarity(door.sensor_polarity)
        .with_relay_polarity(door.relay_polarity)
        .with_pulse_ms(door.pulse_ms))
}
