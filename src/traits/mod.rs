//! Trait definitions for hardware abstraction.
//!
//! The controller only ever talks to a door through [`DoorHardware`], which
//! lets garage-cover:
//! - Run on a Raspberry Pi through `embedded-hal` GPIO pins
//! - Run its whole state machine on a desktop against mocks
//!
//! # Submodules
//!
//! - `hardware`: Limit switches and the opener relay

pub mod hardware;

pub use hardware::*;
