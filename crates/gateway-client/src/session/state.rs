//! Session states and the commands the controller emits

use crate::error::SessionError;
use gateway_protocol::{ClosePolicy, DispatchEvent, GatewayCommand};
use std::fmt;
use std::time::Duration;

/// Close code that keeps the session resumable on the gateway side
pub const RESUMABLE_CLOSE_CODE: u16 = 4000;

/// Normal closure; the gateway invalidates the session
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection and nothing to resume
    Disconnected,
    /// Transport connected, waiting for Hello
    AwaitingHello,
    /// Identify or Resume sent, waiting for the first Dispatch
    Identifying,
    /// Receiving dispatches
    Connected { sequence: u64 },
    /// Connection is going away, next step not decided yet
    ///
    /// The controller never rests here: every disconnect resolves within
    /// the same call to `Resuming`, `Reidentifying` or `Aborted`.
    Disconnecting,
    /// Will reconnect and resume the held session
    Resuming,
    /// Will reconnect and identify from scratch
    Reidentifying,
    /// Closed with a code that forbids reconnecting
    Aborted,
}

impl SessionState {
    /// Whether a transport connection is currently in use
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            Self::AwaitingHello | Self::Identifying | Self::Connected { .. }
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::AwaitingHello => f.write_str("awaiting hello"),
            Self::Identifying => f.write_str("identifying"),
            Self::Connected { sequence } => write!(f, "connected (seq {sequence})"),
            Self::Disconnecting => f.write_str("disconnecting"),
            Self::Resuming => f.write_str("resuming"),
            Self::Reidentifying => f.write_str("reidentifying"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Side effects for the runner to perform, in order
#[derive(Debug, Clone)]
pub enum Command {
    /// Encode and write a command
    Send(GatewayCommand),
    /// (Re)start the heartbeat timer
    StartHeartbeat {
        interval: Duration,
        initial_delay: Duration,
    },
    StopHeartbeat,
    /// Drop this connection and connect again
    ///
    /// `close_code` is `None` when the transport is already closed. `url` is
    /// the resume URL when one is known.
    Reconnect {
        close_code: Option<u16>,
        url: Option<String>,
    },
    /// Close the transport and stop for good
    Close { code: u16 },
    /// Hand a dispatch to the application
    Deliver(DispatchEvent),
}

/// Why the last connection ended
#[derive(Debug)]
pub enum DisconnectReason {
    /// The transport closed; the policy the close code resolved to
    Closed(ClosePolicy),
    /// The gateway sent Reconnect
    ReconnectRequested,
    /// The gateway sent Invalid Session
    InvalidSession { resumable: bool },
    /// Heartbeat or transport failure
    Failed(SessionError),
    /// Local shutdown
    Shutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(policy) => match policy.code {
                Some(code) => write!(f, "closed with {code} ({})", policy.description),
                None => write!(f, "closed ({})", policy.description),
            },
            Self::ReconnectRequested => f.write_str("reconnect requested"),
            Self::InvalidSession { resumable } => {
                write!(f, "invalid session (resumable: {resumable})")
            }
            Self::Failed(err) => write!(f, "{err}"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}
