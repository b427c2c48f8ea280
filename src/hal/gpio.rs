//! Door driver over `embedded-hal` 1.0 digital pins.
//!
//! Works with any HAL that implements the `embedded-hal` 1.0 traits
//! (`rppal` on a Raspberry Pi, `esp-idf-hal`, `linux-embedded-hal`, ...).
//!
//! # Wiring
//!
//! The reference installation uses:
//!
//! - Reed switches to ground with internal pull-ups: a closed switch reads
//!   low, so both limit inputs are [`Polarity::ActiveLow`].
//! - An active-low relay board: driving the pin low energises the relay.
//!   The pin must be configured high (relay off) before it is handed over.
//!
//! # Example
//!
//! ```ignore
//! use garage_cover::hal::{GpioDoor, Polarity};
//! use rppal::gpio::Gpio;
//! use rppal::hal::Delay;
//!
//! let gpio = Gpio::new()?;
//! let door = GpioDoor::new(
//!     gpio.get(27)?.into_input_pullup(),
//!     gpio.get(22)?.into_input_pullup(),
//!     gpio.get(16)?.into_output_high(),
//!     Delay::new(),
//! );
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, ErrorKind, InputPin, OutputPin};

use crate::traits::DoorHardware;

/// Default relay pulse length in milliseconds.
pub const DEFAULT_PULSE_MS: u32 = 500;

/// Electrical polarity of a digital signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Polarity {
    /// Low level means asserted (pull-up inputs, low-trigger relays).
    #[default]
    ActiveLow,
    /// High level means asserted.
    ActiveHigh,
}

/// GPIO failure, tagged with the pin role that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpioError {
    /// Reading the open limit switch failed.
    OpenSensor(ErrorKind),
    /// Reading the closed limit switch failed.
    ClosedSensor(ErrorKind),
    /// Driving the relay failed.
    Relay(ErrorKind),
}

/// A garage door wired to two input pins, one output pin and a delay source.
///
/// The relay is deasserted again when the driver is dropped, so every exit
/// path leaves the opener contacts open.
pub struct GpioDoor<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    open_sensor: I,
    closed_sensor: I,
    relay: O,
    delay: D,
    sensor_polarity: Polarity,
    relay_polarity: Polarity,
    pulse_ms: u32,
}

impl<I, O, D> GpioDoor<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    /// Creates a door with active-low sensors, an active-low relay and a
    /// 500 ms pulse.
    pub fn new(open_sensor: I, closed_sensor: I, relay: O, delay: D) -> Self {
        Self {
            open_sensor,
            closed_sensor,
            relay,
            delay,
            sensor_polarity: Polarity::ActiveLow,
            relay_polarity: Polarity::ActiveLow,
            pulse_ms: DEFAULT_PULSE_MS,
        }
    }

    /// Set the polarity of both limit switches.
    pub fn with_sensor_polarity(mut self, polarity: Polarity) -> Self {
        self.sensor_polarity = polarity;
        self
    }

    /// Set the relay polarity.
    pub fn with_relay_polarity(mut self, polarity: Polarity) -> Self {
        self.relay_polarity = polarity;
        self
    }

    /// Set the pulse length.
    pub fn with_pulse_ms(mut self, ms: u32) -> Self {
        self.pulse_ms = ms;
        self
    }

    /// Configured pulse length in milliseconds.
    #[inline]
    pub fn pulse_ms(&self) -> u32 {
        self.pulse_ms
    }

    /// Drive the relay to its inactive level.
    pub fn release(&mut self) -> Result<(), GpioError> {
        self.drive_relay(false)
    }

    fn drive_relay(&mut self, asserted: bool) -> Result<(), GpioError> {
        let high = match self.relay_polarity {
            Polarity::ActiveLow => !asserted,
            Polarity::ActiveHigh => asserted,
        };
        let result = if high {
            self.relay.set_high()
        } else {
            self.relay.set_low()
        };
        result.map_err(|e| GpioError::Relay(e.kind()))
    }

    fn is_asserted(pin: &mut I, polarity: Polarity) -> Result<bool, ErrorKind> {
        match polarity {
            Polarity::ActiveLow => pin.is_low(),
            Polarity::ActiveHigh => pin.is_high(),
        }
        .map_err(|e| e.kind())
    }
}

impl<I, O, D> DoorHardware for GpioDoor<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    type Error = GpioError;

    fn open_limit(&mut self) -> Result<bool, GpioError> {
        Self::is_asserted(&mut self.open_sensor, self.sensor_polarity)
            .map_err(GpioError::OpenSensor)
    }

    fn closed_limit(&mut self) -> Result<bool, GpioError> {
        Self::is_asserted(&mut self.closed_sensor, self.sensor_polarity)
            .map_err(GpioError::ClosedSensor)
    }

    fn pulse(&mut self) -> Result<(), GpioError> {
        self.drive_relay(true)?;
        self.delay.delay_ms(self.pulse_ms);
        self.drive_relay(false)
    }
}

impl<I, O, D> Drop for GpioDoor<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    fn drop(&mut self) {
        let _ = self.release();
    }
}
