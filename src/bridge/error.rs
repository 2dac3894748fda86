//! Error types for the command bridge
//!
//! Remote failures keep the interpreter's own vocabulary (exception class
//! name, message, formatted traceback) so callers can match on them.

use super::command::CommandId;
use std::fmt;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// An exception raised by a script inside the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// Exception class name (e.g. "ZeroDivisionError")
    pub name: String,
    /// `str(exception)`
    pub message: String,
    /// Formatted traceback, as produced by the interpreter
    pub traceback: String,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

impl std::error::Error for RemoteError {}

/// Errors surfaced by the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// The script raised inside the sandbox
    Remote(RemoteError),

    /// A reply arrived while no command was in flight
    Desync,

    /// A reply was tagged for a command other than the current one
    StaleReply {
        expected: CommandId,
        got: CommandId,
    },

    /// The sandbox did not answer before the configured deadline
    TimedOut {
        id: CommandId,
        after_ms: f64,
    },

    /// Commands are still outstanding on a bridge being replaced
    Busy {
        outstanding: usize,
    },

    /// A value could not be represented in the interchange format
    Encode(String),

    /// A reply could not be decoded
    Decode(String),

    /// The transport refused the payload
    Transport(String),

    /// The channel slot still holds an unread script
    ChannelOccupied,

    /// The dispatcher went away before the command settled
    Dropped,
}

impl BridgeError {
    /// The remote exception, if this error came from the sandbox
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }

    /// Kind name reported to JS callers (`Error.name`)
    pub fn name(&self) -> &str {
        match self {
            Self::Remote(e) => &e.name,
            Self::Desync => "BridgeDesyncError",
            Self::StaleReply { .. } => "BridgeStaleReplyError",
            Self::TimedOut { .. } => "TimeoutError",
            Self::Busy { .. } => "BridgeBusyError",
            Self::Encode(_) => "EncodeError",
            Self::Decode(_) => "DecodeError",
            Self::Transport(_) => "TransportError",
            Self::ChannelOccupied => "ChannelOccupiedError",
            Self::Dropped => "AbortError",
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(e) => write!(f, "{}", e),
            Self::Desync => write!(f, "unexpected command result: no command in flight"),
            Self::StaleReply { expected, got } => {
                write!(f, "stale reply for {} while {} is in flight", got, expected)
            }
            Self::TimedOut { id, after_ms } => {
                write!(f, "{} timed out after {} ms", id, after_ms)
            }
            Self::Busy { outstanding } => {
                write!(f, "cannot reconfigure with {} command(s) outstanding", outstanding)
            }
            Self::Encode(s) => write!(f, "cannot encode value: {}", s),
            Self::Decode(s) => write!(f, "cannot decode reply: {}", s),
            Self::Transport(s) => write!(f, "transport error: {}", s),
            Self::ChannelOccupied => write!(f, "channel already holds an unread script"),
            Self::Dropped => write!(f, "command dropped before completion"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<RemoteError> for BridgeError {
    fn from(e: RemoteError) -> Self {
        Self::Remote(e)
    }
}
