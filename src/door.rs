//! Door states, commands, and command outcomes.
//!
//! These are the vocabulary types shared by the [`DoorController`] state
//! machine and the MQTT bridge. Every type has a lowercase wire token used
//! on the `garage/<id>/state` and `garage/<id>/set` topics.
//!
//! # Example
//!
//! ```rust
//! use garage_cover::{DoorCommand, DoorState};
//!
//! assert_eq!(DoorCommand::from_text(" OPEN "), Some(DoorCommand::Open));
//! assert_eq!(DoorState::Closing.as_str(), "closing");
//! assert!(DoorState::Open.is_settled());
//! assert!(DoorState::Opening.is_moving());
//! ```
//!
//! [`DoorController`]: crate::DoorController

/// Categorical position of a garage door.
///
/// `Open` and `Closed` are only ever produced by a limit switch reading.
/// `Opening` and `Closing` are either declared by a command or carried
/// forward while the door is between both limits.
///
/// # Default
///
/// Defaults to [`Unknown`](Self::Unknown): nothing is known until the
/// sensors have been sampled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DoorState {
    /// Open limit switch asserted.
    Open,
    /// Closed limit switch asserted.
    Closed,
    /// Travelling towards the open limit.
    Opening,
    /// Travelling towards the closed limit.
    Closing,
    /// Neither limit asserted and no history to disambiguate.
    #[default]
    Unknown,
}

impl DoorState {
    /// Returns the wire token for this state.
    ///
    /// ```
    /// use garage_cover::DoorState;
    ///
    /// assert_eq!(DoorState::Open.as_str(), "open");
    /// assert_eq!(DoorState::Closed.as_str(), "closed");
    /// assert_eq!(DoorState::Opening.as_str(), "opening");
    /// assert_eq!(DoorState::Closing.as_str(), "closing");
    /// assert_eq!(DoorState::Unknown.as_str(), "unknown");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DoorState::Open => "open",
            DoorState::Closed => "closed",
            DoorState::Opening => "opening",
            DoorState::Closing => "closing",
            DoorState::Unknown => "unknown",
        }
    }

    /// Parse a state token. Input is trimmed and case-insensitive.
    pub fn from_text(s: &str) -> Option<Self> {
        let s = s.trim();
        [
            DoorState::Open,
            DoorState::Closed,
            DoorState::Opening,
            DoorState::Closing,
            DoorState::Unknown,
        ]
        .into_iter()
        .find(|state| state.as_str().eq_ignore_ascii_case(s))
    }

    /// True for states confirmed by a limit switch (`Open`, `Closed`).
    #[inline]
    pub const fn is_settled(&self) -> bool {
        matches!(self, DoorState::Open | DoorState::Closed)
    }

    /// True for the transient travel states (`Opening`, `Closing`).
    #[inline]
    pub const fn is_moving(&self) -> bool {
        matches!(self, DoorState::Opening | DoorState::Closing)
    }
}

impl core::fmt::Display for DoorState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command accepted on a door's `set` topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DoorCommand {
    /// Drive the door to its open limit.
    Open,
    /// Drive the door to its closed limit.
    Close,
    /// Halt a door that is currently travelling.
    Stop,
}

impl DoorCommand {
    /// Returns the wire token for this command.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DoorCommand::Open => "open",
            DoorCommand::Close => "close",
            DoorCommand::Stop => "stop",
        }
    }

    /// Parse a command token.
    ///
    /// Input is trimmed and case-insensitive. Anything other than `open`,
    /// `close` or `stop` is rejected.
    ///
    /// ```
    /// use garage_cover::DoorCommand;
    ///
    /// assert_eq!(DoorCommand::from_text("open"), Some(DoorCommand::Open));
    /// assert_eq!(DoorCommand::from_text("CLOSE"), Some(DoorCommand::Close));
    /// assert_eq!(DoorCommand::from_text("\tStop\n"), Some(DoorCommand::Stop));
    /// assert_eq!(DoorCommand::from_text("toggle"), None);
    /// assert_eq!(DoorCommand::from_text(""), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        let s = s.trim();
        [DoorCommand::Open, DoorCommand::Close, DoorCommand::Stop]
            .into_iter()
            .find(|cmd| cmd.as_str().eq_ignore_ascii_case(s))
    }

    /// Parse a raw MQTT payload.
    ///
    /// Non-UTF-8 payloads are rejected the same way as unknown tokens.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        core::str::from_utf8(payload).ok().and_then(Self::from_text)
    }
}

impl core::fmt::Display for DoorCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handing a command to [`DoorController::handle_command`].
///
/// [`DoorController::handle_command`]: crate::DoorController::handle_command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The door was already where the command wanted it. No pulse was issued.
    Unchanged,
    /// One pulse was issued and the door is now reported in the given
    /// transient state.
    Started(DoorState),
    /// One pulse was issued to halt a travelling door. No state is declared.
    Stopped,
}

impl CommandOutcome {
    /// True if the relay was pulsed to produce this outcome.
    #[inline]
    pub const fn pulsed(&self) -> bool {
        !matches!(self, CommandOutcome::Unchanged)
    }

    /// The transient state declared by the command, if any.
    #[inline]
    pub const fn declared_state(&self) -> Option<DoorState> {
        match self {
            CommandOutcome::Started(state) => Some(*state),
            _ => None,
        }
    }
}
