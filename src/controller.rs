//! Per-door state machine.
//!
//! This module provides [`DoorController`], which owns one door's hardware
//! and the memory needed to tell an opening door from a closing one.
//!
//! # Overview
//!
//! A door only has two limit switches, so while it travels between them
//! the sensors alone cannot say which way it is moving. The controller
//! keeps two pieces of history:
//!
//! - the last state a limit switch actually confirmed (`Open` / `Closed`)
//! - the last state the door carried, inferred or declared by a command
//!
//! and resolves the in-between case from them:
//!
//! | open | closed | previous state | last confirmed | result |
//! |------|--------|----------------|----------------|--------|
//! | on   | any    | any            | any            | `Open` |
//! | off  | on     | any            | any            | `Closed` |
//! | off  | off    | `Closing`      | any            | `Closing` |
//! | off  | off    | `Opening`      | any            | `Opening` |
//! | off  | off    | other          | `Open`         | `Closing` |
//! | off  | off    | other          | `Closed`       | `Opening` |
//! | off  | off    | other          | `Unknown`      | `Unknown` |
//!
//! # Example
//!
//! ```rust
//! use garage_cover::{CommandOutcome, DoorCommand, DoorConfig, DoorController, DoorState};
//! use garage_cover::hal::MockDoorHardware;
//!
//! let config = DoorConfig::new("tor_mitte", "Tor Mitte", 16, 27, 22);
//! let mut door = DoorController::new(config, MockDoorHardware::closed());
//! assert_eq!(door.infer_state().unwrap(), DoorState::Closed);
//!
//! // Opening a closed door pulses the relay once
//! let outcome = door.handle_command(DoorCommand::Open).unwrap();
//! assert_eq!(outcome, CommandOutcome::Started(DoorState::Opening));
//!
//! // Mid-travel the door keeps reporting Opening
//! door.hardware_mut().set_limits(false, false);
//! assert_eq!(door.infer_state().unwrap(), DoorState::Opening);
//!
//! // Until the open limit is reached
//! door.hardware_mut().set_limits(true, false);
//! assert_eq!(door.infer_state().unwrap(), DoorState::Open);
//! ```

use crate::config::DoorConfig;
use crate::door::{CommandOutcome, DoorCommand, DoorState};
use crate::error::DoorError;
use crate::traits::DoorHardware;

/// State machine for a single garage door.
///
/// # Type Parameter
///
/// - `H`: The door hardware implementation ([`DoorHardware`] trait)
///
/// # Thread Safety
///
/// The controller itself is not thread-safe. Inference reads and writes the
/// door's history, so every call for one door must be serialized. The
/// services module keeps each controller behind its own mutex.
pub struct DoorController<H: DoorHardware> {
    config: DoorConfig,
    hardware: H,
    last_confirmed: DoorState,
    last_inferred: DoorState,
}

impl<H: DoorHardware> DoorController<H> {
    /// Create a controller with no history (`Unknown`).
    pub fn new(config: DoorConfig, hardware: H) -> Self {
        Self {
            config,
            hardware,
            last_confirmed: DoorState::Unknown,
            last_inferred: DoorState::Unknown,
        }
    }

    /// The door's static configuration.
    #[inline]
    pub fn config(&self) -> &DoorConfig {
        &self.config
    }

    /// The door's id.
    #[inline]
    pub fn id(&self) -> &str {
        self.config.id.as_str()
    }

    /// Last state confirmed by a limit switch.
    ///
    /// Always one of `Open`, `Closed` or `Unknown`.
    #[inline]
    pub fn last_confirmed(&self) -> DoorState {
        self.last_confirmed
    }

    /// Last state the door carried, inferred or declared.
    #[inline]
    pub fn last_inferred(&self) -> DoorState {
        self.last_inferred
    }

    /// Shared access to the hardware.
    #[inline]
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Mutable access to the hardware.
    #[inline]
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Consume the controller and return the hardware.
    pub fn into_hardware(self) -> H {
        self.hardware
    }

    /// Sample both limit switches and resolve the door's state.
    ///
    /// Updates the confirmed state when a limit switch is asserted. With
    /// unchanged readings, repeated calls return the same state.
    pub fn infer_state(&mut self) -> Result<DoorState, DoorError<H::Error>> {
        let (open, closed) = self.hardware.read_limits().map_err(DoorError::Hardware)?;
        let state = resolve(open, closed, self.last_inferred, self.last_confirmed);

        if state.is_settled() {
            self.last_confirmed = state;
        }
        self.last_inferred = state;
        Ok(state)
    }

    /// Validate a command against the current state and pulse the relay if
    /// it would do something.
    ///
    /// - `Open` on an open door and `Close` on a closed door are no-ops.
    /// - `Stop` only pulses a door that is not resting at a limit, so a
    ///   stray stop never restarts a settled door.
    ///
    /// Transient states declared here never become the confirmed state.
    pub fn handle_command(
        &mut self,
        command: DoorCommand,
    ) -> Result<CommandOutcome, DoorError<H::Error>> {
        let current = self.infer_state()?;

        let outcome = match (command, current) {
            (DoorCommand::Open, DoorState::Open) | (DoorCommand::Close, DoorState::Closed) => {
                CommandOutcome::Unchanged
            }
            (DoorCommand::Stop, state) if state.is_settled() => CommandOutcome::Unchanged,
            (DoorCommand::Open, _) => CommandOutcome::Started(DoorState::Opening),
            (DoorCommand::Close, _) => CommandOutcome::Started(DoorState::Closing),
            (DoorCommand::Stop, _) => CommandOutcome::Stopped,
        };

        if outcome.pulsed() {
            tracing::debug!(door = self.id(), %command, %current, "pulsing relay");
            self.hardware.pulse().map_err(DoorError::Hardware)?;
        }
        if let Some(declared) = outcome.declared_state() {
            self.last_inferred = declared;
        }

        Ok(outcome)
    }
}

/// Resolve a door state from one sensor sample and the door's history.
///
/// Pure function behind [`DoorController::infer_state`]. The open switch
/// wins when both are asserted.
///
/// ```
/// use garage_cover::controller::resolve;
/// use garage_cover::DoorState::*;
///
/// assert_eq!(resolve(true, true, Unknown, Unknown), Open);
/// assert_eq!(resolve(false, false, Open, Open), Closing);
/// assert_eq!(resolve(false, false, Opening, Open), Opening);
/// ```
pub fn resolve(
    open: bool,
    closed: bool,
    last_inferred: DoorState,
    last_confirmed: DoorState,
) -> DoorState {
    if open {
        return DoorState::Open;
    }
    if closed {
        return DoorState::Closed;
    }
    match last_inferred {
        DoorState::Opening | DoorState::Closing => last_inferred,
        _ => match last_confirmed {
            DoorState::Open => DoorState::Closing,
            DoorState::Closed => DoorState::Opening,
            _ => DoorState::Unknown,
        },
    }
}
