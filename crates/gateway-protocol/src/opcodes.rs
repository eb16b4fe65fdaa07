//! Gateway operation codes
//!
//! The registry every decoded envelope passes through before its payload is looked at.

use crate::error::UnknownOpcode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gateway operation codes
///
/// Value 5 is reserved and must stay unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// An event was dispatched (server only)
    Dispatch = 0,
    /// Keep the connection alive (client/server)
    Heartbeat = 1,
    /// Start a new session (client only)
    Identify = 2,
    /// Update the client's presence (client only)
    PresenceUpdate = 3,
    /// Join, move or leave a voice channel (client only)
    VoiceStateUpdate = 4,
    /// Resume a previous session (client only)
    Resume = 6,
    /// The client should reconnect and resume (server only)
    Reconnect = 7,
    /// Request offline guild members (client only)
    RequestGuildMembers = 8,
    /// The session has been invalidated (server only)
    InvalidSession = 9,
    /// Sent right after connecting, carries the heartbeat interval (server only)
    Hello = 10,
    /// Acknowledges a received heartbeat (server only)
    HeartbeatAck = 11,
}

impl Opcode {
    /// Every defined opcode, in wire order
    pub const ALL: [Opcode; 11] = [
        Self::Dispatch,
        Self::Heartbeat,
        Self::Identify,
        Self::PresenceUpdate,
        Self::VoiceStateUpdate,
        Self::Resume,
        Self::Reconnect,
        Self::RequestGuildMembers,
        Self::InvalidSession,
        Self::Hello,
        Self::HeartbeatAck,
    ];

    /// Create an `Opcode` from a raw wire value
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            3 => Some(Self::PresenceUpdate),
            4 => Some(Self::VoiceStateUpdate),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            8 => Some(Self::RequestGuildMembers),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }

    /// Classify a raw `op` value taken from an envelope shell
    pub fn classify(raw: u64) -> Result<Self, UnknownOpcode> {
        u8::try_from(raw)
            .ok()
            .and_then(Self::from_u8)
            .ok_or(UnknownOpcode(raw))
    }

    /// Get the raw wire value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this opcode can be sent by the client
    #[must_use]
    pub const fn is_client_op(self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::Identify
                | Self::PresenceUpdate
                | Self::VoiceStateUpdate
                | Self::Resume
                | Self::RequestGuildMembers
        )
    }

    /// Check if this opcode can be sent by the server
    #[must_use]
    pub const fn is_server_op(self) -> bool {
        matches!(
            self,
            Self::Dispatch
                | Self::Heartbeat
                | Self::Reconnect
                | Self::InvalidSession
                | Self::Hello
                | Self::HeartbeatAck
        )
    }

    /// Get the name of this opcode
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::PresenceUpdate => "PresenceUpdate",
            Self::VoiceStateUpdate => "VoiceStateUpdate",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::RequestGuildMembers => "RequestGuildMembers",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl Serialize for Opcode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Opcode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u64::deserialize(deserializer)?;
        Self::classify(value).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        op.as_u8()
    }
}
