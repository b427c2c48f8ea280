//! Error types for the door controller and command parsing.

use alloc::string::String;

/// Errors raised while driving a single door.
///
/// Generic over the hardware error type so mock, GPIO and future
/// backends can all report their own failures.
#[derive(Debug, thiserror::Error)]
pub enum DoorError<E: core::fmt::Debug> {
    /// Reading a limit switch or pulsing the relay failed.
    #[error("door hardware error: {0:?}")]
    Hardware(E),
}

/// A command that was rejected before it reached any door.
///
/// Command errors are logged and dropped; they never cause an actuator
/// pulse or a state publish.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The topic does not match `<prefix>/<id>/set`.
    #[error("unrecognized command topic: {0}")]
    UnknownTopic(String),

    /// The topic names a door that is not configured.
    #[error("no door configured with id {0}")]
    UnknownDoor(String),

    /// The payload is not one of `open`, `close`, `stop`.
    #[error("unrecognized command payload: {0:?}")]
    InvalidPayload(String),

    /// The door's command queue is full or its worker has stopped.
    #[error("door {0} is not accepting commands")]
    DoorBusy(String),
}
