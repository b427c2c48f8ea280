//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `gpio`: Generic driver over `embedded-hal` 1.0 pins (Raspberry Pi via `rppal`)

pub mod gpio;
pub mod mock;

pub use gpio::*;
pub use mock::*;
