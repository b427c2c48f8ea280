//! Mock implementations for testing without hardware.
//!
//! This module provides a test double for [`DoorHardware`], enabling the
//! state machine and the MQTT bridge to be exercised on a desktop without
//! limit switches or relays.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockDoorHardware`] | [`DoorHardware`] | Settable limit switches, counts pulses |
//!
//! # Example
//!
//! ```rust
//! use garage_cover::{DoorCommand, DoorConfig, DoorController, DoorState};
//! use garage_cover::hal::MockDoorHardware;
//!
//! let config = DoorConfig::new("tor_mitte", "Tor Mitte", 16, 27, 22);
//! let mut door = DoorController::new(config, MockDoorHardware::closed());
//!
//! door.handle_command(DoorCommand::Open).unwrap();
//! assert_eq!(door.hardware().pulse_count, 1);
//!
//! // The door leaves the closed limit
//! door.hardware_mut().set_limits(false, false);
//! assert_eq!(door.infer_state().unwrap(), DoorState::Opening);
//! ```
//!
//! [`DoorHardware`]: crate::traits::DoorHardware

use crate::traits::DoorHardware;

/// Mock door hardware for testing.
///
/// Limit switches are plain fields; pulses are counted and never move the
/// door by themselves. Tests script the physical travel with
/// [`set_limits`](Self::set_limits).
///
/// Set [`fail`](Self::fail) to make every call return an error.
#[derive(Debug, Default, Clone)]
pub struct MockDoorHardware {
    /// Open limit switch asserted.
    pub open: bool,
    /// Closed limit switch asserted.
    pub closed: bool,
    /// Number of times `pulse` was called.
    pub pulse_count: usize,
    /// Number of sensor reads (each limit switch counts once).
    pub read_count: usize,
    /// When true, every operation fails with [`MockHardwareError`].
    pub fail: bool,
}

/// Error returned by [`MockDoorHardware`] when `fail` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockHardwareError;

impl MockDoorHardware {
    /// Door between limits (neither switch asserted).
    pub fn new() -> Self {
        Self::default()
    }

    /// Door resting at the open limit.
    pub fn open() -> Self {
        Self {
            open: true,
            ..Self::default()
        }
    }

    /// Door resting at the closed limit.
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    /// Set both limit switches at once.
    pub fn set_limits(&mut self, open: bool, closed: bool) {
        self.open = open;
        self.closed = closed;
    }

    fn check(&self) -> Result<(), MockHardwareError> {
        if self.fail {
            Err(MockHardwareError)
        } else {
            Ok(())
        }
    }
}

impl DoorHardware for MockDoorHardware {
    type Error = MockHardwareError;

    fn open_limit(&mut self) -> Result<bool, MockHardwareError> {
        self.check()?;
        self.read_count += 1;
        Ok(self.open)
    }

    fn closed_limit(&mut self) -> Result<bool, MockHardwareError> {
        self.check()?;
        self.read_count += 1;
        Ok(self.closed)
    }

    fn pulse(&mut self) -> Result<(), MockHardwareError> {
        self.check()?;
        self.pulse_count += 1;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_door_default_is_between_limits() {
        let mut door = MockDoorHardware::new();
        assert_eq!(door.read_limits(), Ok((false, false)));
        assert_eq!(door.pulse_count, 0);
    }

    #[test]
    fn mock_door_constructors() {
        assert_eq!(MockDoorHardware::open().read_limits(), Ok((true, false)));
        assert_eq!(MockDoorHardware::closed().read_limits(), Ok((false, true)));
    }

    #[test]
    fn mock_door_counts_pulses_and_reads() {
        let mut door = MockDoorHardware::closed();
        door.pulse().unwrap();
        door.pulse().unwrap();
        let _ = door.read_limits().unwrap();
        assert_eq!(door.pulse_count, 2);
        assert_eq!(door.read_count, 2);
    }

    #[test]
    fn mock_door_set_limits() {
        let mut door = MockDoorHardware::closed();
        door.set_limits(true, true);
        assert_eq!(door.read_limits(), Ok((true, true)));
    }

    #[test]
    fn mock_door_failure_mode() {
        let mut door = MockDoorHardware::open();
        door.fail = true;
        assert_eq!(door.open_limit(), Err(MockHardwareError));
        assert_eq!(door.pulse(), Err(MockHardwareError));
        assert_eq!(door.pulse_count, 0);
    }
}
