//! Hardware abstraction for a single garage door.
//!
//! A door is wired with two limit switches and one relay that shorts the
//! opener's push-button contacts. The [`DoorHardware`] trait captures exactly
//! those three capabilities so the state machine can run against GPIO pins,
//! mocks, or anything else.
//!
//! # Implementation
//!
//! For testing and desktop development, use [`MockDoorHardware`] from
//! [`crate::hal::mock`]. For real pins, wrap any `embedded-hal` 1.0 input and
//! output pins in [`GpioDoor`].
//!
//! # Example
//!
//! ```rust
//! use garage_cover::traits::DoorHardware;
//! use garage_cover::hal::MockDoorHardware;
//!
//! let mut door = MockDoorHardware::closed();
//! assert!(door.closed_limit().unwrap());
//! assert!(!door.open_limit().unwrap());
//!
//! door.pulse().unwrap();
//! assert_eq!(door.pulse_count, 1);
//! ```
//!
//! [`MockDoorHardware`]: crate::hal::MockDoorHardware
//! [`GpioDoor`]: crate::hal::GpioDoor

/// Sensor and actuator capabilities of one garage door.
///
/// # Implementation Notes
///
/// - `open_limit` / `closed_limit` return `true` when the door is physically
///   at that end of travel (switch asserted), regardless of wiring polarity.
/// - `pulse` asserts the relay for the configured duration and then
///   deasserts it. It blocks for the whole pulse.
/// - A pulse only triggers the opener. Direction is decided mechanically by
///   the opener, never by software.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use garage_cover::traits::DoorHardware;
///
/// struct MyDoor { /* pin handles */ }
///
/// impl DoorHardware for MyDoor {
///     type Error = ();
///
///     fn open_limit(&mut self) -> Result<bool, ()> {
///         // Read the open reed switch...
///         Ok(false)
///     }
///
///     fn closed_limit(&mut self) -> Result<bool, ()> {
///         Ok(true)
///     }
///
///     fn pulse(&mut self) -> Result<(), ()> {
///         // Relay on, wait, relay off...
///         Ok(())
///     }
/// }
/// ```
pub trait DoorHardware {
    /// Error type for sensor reads and relay pulses.
    type Error: core::fmt::Debug;

    /// Returns true if the open limit switch is asserted.
    fn open_limit(&mut self) -> Result<bool, Self::Error>;

    /// Returns true if the closed limit switch is asserted.
    fn closed_limit(&mut self) -> Result<bool, Self::Error>;

    /// Pulse the opener relay once. Blocks for the pulse duration.
    fn pulse(&mut self) -> Result<(), Self::Error>;

    /// Reads both limit switches as `(open, closed)`.
    fn read_limits(&mut self) -> Result<(bool, bool), Self::Error> {
        Ok((self.open_limit()?, self.closed_limit()?))
    }
}

impl<T: DoorHardware + ?Sized> DoorHardware for &mut T {
    type Error = T::Error;

    fn open_limit(&mut self) -> Result<bool, Self::Error> {
        (**self).open_limit()
    }

    fn closed_limit(&mut self) -> Result<bool, Self::Error> {
        (**self).closed_limit()
    }

    fn pulse(&mut self) -> Result<(), Self::Error> {
        (**self).pulse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestDoor {
        open: bool,
        closed: bool,
        reads: usize,
    }

    impl DoorHardware for TestDoor {
        type Error = ();

        fn open_limit(&mut self) -> Result<bool, ()> {
            self.reads += 1;
            Ok(self.open)
        }

        fn closed_limit(&mut self) -> Result<bool, ()> {
            self.reads += 1;
            Ok(self.closed)
        }

        fn pulse(&mut self) -> Result<(), ()> {
            Ok(())
        }
    }

    #[test]
    fn read_limits_default_impl_reads_both() {
        let mut door = TestDoor {
            open: true,
            closed: false,
            reads: 0,
        };
        assert_eq!(door.read_limits(), Ok((true, false)));
        assert_eq!(door.reads, 2);
    }

    #[test]
    fn mutable_reference_forwards() {
        let mut door = TestDoor {
            open: false,
            closed: true,
            reads: 0,
        };
        let mut borrowed = &mut door;
        assert_eq!(DoorHardware::read_limits(&mut borrowed), Ok((false, true)));
        assert_eq!(door.reads, 2);
    }
}
