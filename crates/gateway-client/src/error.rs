//! Session error types

use crate::session::SessionState;
use crate::transport::TransportError;
use gateway_protocol::{EncodeError, InvalidIntentBits, Opcode};
use std::time::Duration;
use thiserror::Error;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by the session controller and runner
#[derive(Debug, Error)]
pub enum SessionError {
    /// The gateway closed with a code that forbids reconnecting
    #[error("gateway closed the session with {code} ({description}): {explanation}")]
    NonReconnectableClose {
        code: u16,
        description: &'static str,
        explanation: &'static str,
    },

    /// No heartbeat ack arrived within one interval
    #[error("heartbeat not acknowledged within {interval:?}")]
    ZombieConnection { interval: Duration },

    #[error(transparent)]
    InvalidIntents(#[from] InvalidIntentBits),

    /// The Identify payload failed validation
    #[error("invalid handshake: {0}")]
    InvalidHandshake(#[source] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every allowed reconnect closed before the session reached `Connected`
    #[error("gave up after {attempts} connections closed before the session started")]
    ReconnectExhausted { attempts: u32 },

    /// A previous close was terminal; the session will not connect again
    #[error("session aborted")]
    Aborted,

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    /// Handshake and heartbeat operations are driven by the session itself
    #[error("{0} is managed by the session and cannot be sent directly")]
    ReservedCommand(Opcode),
}

impl SessionError {
    /// Whether the runner stops for good after this error
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NonReconnectableClose { .. }
                | Self::ReconnectExhausted { .. }
                | Self::Aborted
                | Self::InvalidIntents(_)
                | Self::InvalidHandshake(_)
        )
    }
}

impl From<EncodeError> for SessionError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::InvalidIntents(bits) => Self::InvalidIntents(bits),
            other => Self::InvalidHandshake(other),
        }
    }
}

/// A Dispatch arrived with a sequence not greater than the last one seen
///
/// Logged and counted; the session carries on with the larger sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sequence regressed from {previous} to {received}")]
pub struct SequenceRegression {
    pub previous: u64,
    pub received: u64,
}
