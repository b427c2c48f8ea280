//! # garage-cover
//!
//! A garage door controller that exposes each door to a home-automation hub
//! as an MQTT cover.
//!
//! ## Features
//!
//! - **Hardware abstraction**: one trait for two limit switches and a relay
//! - **Direction inference**: tells `opening` from `closing` with only two
//!   limit switches
//! - **Idempotent commands**: `open`/`close` on a door already there never
//!   pulses the relay, `stop` never restarts a resting door
//! - **MQTT bridge**: discovery, retained state, reconnect republish and
//!   changed-only periodic updates (feature `mqtt`)
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware abstraction
//! - `door` - State, command and outcome types
//! - `controller` - Per-door state machine
//! - `config` - Broker, topic and door configuration
//! - `hal` - Concrete implementations (mock for testing, generic GPIO)
//! - `services` - MQTT bridge, workers and poller
//!
//! ## Example
//!
//! ```rust
//! use garage_cover::{DoorCommand, DoorConfig, DoorController, DoorState, hal::MockDoorHardware};
//!
//! let config = DoorConfig::new("tor_rechts", "Tor Rechts", 26, 24, 23);
//! let mut door = DoorController::new(config, MockDoorHardware::open());
//!
//! door.handle_command(DoorCommand::Close).unwrap();
//! assert_eq!(door.last_inferred(), DoorState::Closing);
//! assert_eq!(door.hardware().pulse_count, 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Broker, topic and door configuration.
pub mod config;
/// Per-door state machine with direction inference.
pub mod controller;
/// Door states, commands and command outcomes.
pub mod door;
/// Error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Core traits for hardware abstraction.
pub mod traits;

/// MQTT bridge and background tasks (feature-gated).
#[cfg(feature = "mqtt")]
pub mod services;

// Re-exports for convenience
pub use config::{
    Config, ConfigError, DoorConfig, GarageConfig, LongString, MqttConfig, ShortString,
    TopicConfig,
};
pub use controller::DoorController;
pub use door::{CommandOutcome, DoorCommand, DoorState};
pub use error::{CommandError, DoorError};
pub use traits::DoorHardware;
