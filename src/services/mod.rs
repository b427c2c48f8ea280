//! MQTT services for the garage doors.
//!
//! This module ties the door controllers to an MQTT broker:
//! - `shared`: per-door locked controllers and change detection
//! - `discovery`: Home Assistant `cover` discovery payloads
//! - `worker`: per-door command workers that run relay pulses off the event loop
//! - `poller`: periodic sampling that publishes changed states
//! - `mqtt`: the `rumqttc` event loop, inbound routing and publishing
//!
//! # Shared State Pattern
//!
//! All services share one `SharedGarageState<H>` wrapped in `Arc`:
//!
//! ```ignore
//! use std::sync::Arc;
//! use garage_cover::services::{GarageMqttHandler, MqttRuntimeConfig, SharedGarageState};
//!
//! let state = Arc::new(SharedGarageState::new(controllers));
//! let handler = GarageMqttHandler::new(Arc::clone(&state), MqttRuntimeConfig::default());
//! ```

pub mod discovery;
pub mod mqtt;
pub mod poller;
pub mod shared;
pub mod worker;

pub use discovery::*;
pub use mqtt::*;
pub use poller::*;
pub use shared::*;
pub use worker::*;
