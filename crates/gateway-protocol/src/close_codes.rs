//! Gateway close event codes
//!
//! Maps the codes the server closes the connection with to a description, an
//! explanation and whether the client may reconnect.

use crate::error::CloseCodeNotFound;
use std::fmt;

/// First code reserved for the gateway; everything below belongs to the transport
pub const GATEWAY_CLOSE_CODE_MIN: u16 = 4000;

/// Gateway close event codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error occurred
    UnknownError = 4000,
    /// Invalid opcode or payload for an opcode sent
    UnknownOpcode = 4001,
    /// Invalid payload sent
    DecodeError = 4002,
    /// Sent a payload before identifying
    NotAuthenticated = 4003,
    /// Token in the identify payload is incorrect
    AuthenticationFailed = 4004,
    /// Sent more than one identify payload
    AlreadyAuthenticated = 4005,
    /// Sequence sent when resuming was invalid
    InvalidSeq = 4007,
    /// Payloads sent too quickly
    RateLimited = 4008,
    /// Session timed out
    SessionTimedOut = 4009,
    /// Invalid shard sent when identifying
    InvalidShard = 4010,
    /// The session would handle too many guilds
    ShardingRequired = 4011,
    /// Invalid gateway version
    InvalidApiVersion = 4012,
    /// Invalid intent bits
    InvalidIntents = 4013,
    /// Intent not enabled or approved
    DisallowedIntents = 4014,
}

impl CloseCode {
    /// The whole catalogue, in code order
    pub const ALL: [CloseCode; 14] = [
        Self::UnknownError,
        Self::UnknownOpcode,
        Self::DecodeError,
        Self::NotAuthenticated,
        Self::AuthenticationFailed,
        Self::AlreadyAuthenticated,
        Self::InvalidSeq,
        Self::RateLimited,
        Self::SessionTimedOut,
        Self::InvalidShard,
        Self::ShardingRequired,
        Self::InvalidApiVersion,
        Self::InvalidIntents,
        Self::DisallowedIntents,
    ];

    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4007 => Some(Self::InvalidSeq),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimedOut),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    /// Look a code up in the catalogue
    pub fn lookup(code: u16) -> Result<Self, CloseCodeNotFound> {
        Self::from_u16(code).ok_or(CloseCodeNotFound(code))
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if the client may reconnect after this close code
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
                | Self::InvalidIntents
                | Self::DisallowedIntents
        )
    }

    /// Short description of this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error",
            Self::UnknownOpcode => "Unknown opcode",
            Self::DecodeError => "Decode error",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::InvalidSeq => "Invalid seq",
            Self::RateLimited => "Rate limited.",
            Self::SessionTimedOut => "Session timed out",
            Self::InvalidShard => "Invalid shard",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intent(s)",
            Self::DisallowedIntents => "Disallowed intent(s)",
        }
    }

    /// What went wrong and what the client should do about it
    #[must_use]
    pub const fn explanation(self) -> &'static str {
        match self {
            Self::UnknownError => "We're not sure what went wrong. Try reconnecting?",
            Self::UnknownOpcode => {
                "You sent an invalid Gateway opcode or an invalid payload for an opcode. Don't do that!"
            }
            Self::DecodeError => "You sent an invalid payload to us. Don't do that!",
            Self::NotAuthenticated => "You sent us a payload prior to identifying.",
            Self::AuthenticationFailed => {
                "The account token sent with your identify payload is incorrect."
            }
            Self::AlreadyAuthenticated => "You sent more than one identify payload. Don't do that!",
            Self::InvalidSeq => {
                "The sequence sent when resuming the session was invalid. Reconnect and start a new session."
            }
            Self::RateLimited => {
                "You're sending payloads to us too quickly. Slow it down! You will be disconnected on receiving this."
            }
            Self::SessionTimedOut => "Your session timed out. Reconnect and start a new one.",
            Self::InvalidShard => "You sent us an invalid shard when identifying.",
            Self::ShardingRequired => {
                "The session would have handled too many guilds - you are required to shard your connection in order to connect."
            }
            Self::InvalidApiVersion => "You sent an invalid version for the gateway.",
            Self::InvalidIntents => {
                "You sent an invalid intent for a Gateway Intent. You may have incorrectly calculated the bitwise value."
            }
            Self::DisallowedIntents => {
                "You sent a disallowed intent for a Gateway Intent. You may have tried to specify an intent that you have not enabled or are not approved for."
            }
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

/// Where a [`ClosePolicy`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    /// The code is in the gateway catalogue
    Catalogue(CloseCode),
    /// The code is in the gateway range but not catalogued
    Unrecognized,
    /// The transport closed below the gateway range, or without a code
    Transport,
}

/// Reconnect decision for a closed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePolicy {
    pub code: Option<u16>,
    pub description: &'static str,
    pub explanation: &'static str,
    pub reconnect: bool,
    pub source: PolicySource,
}

impl ClosePolicy {
    /// Resolve the policy for a close code
    ///
    /// Codes below 4000 never reach the catalogue. Codes in the gateway range that
    /// are not catalogued are assumed transient and may reconnect.
    #[must_use]
    pub fn for_code(code: u16) -> Self {
        if code < GATEWAY_CLOSE_CODE_MIN {
            return Self::transport(Some(code));
        }

        match CloseCode::lookup(code) {
            Ok(known) => Self {
                code: Some(code),
                description: known.description(),
                explanation: known.explanation(),
                reconnect: known.should_reconnect(),
                source: PolicySource::Catalogue(known),
            },
            Err(CloseCodeNotFound(code)) => Self {
                code: Some(code),
                description: "Unrecognized close code",
                explanation: "The gateway closed the connection with a code outside the catalogue.",
                reconnect: true,
                source: PolicySource::Unrecognized,
            },
        }
    }

    /// Policy for a transport-level close (code below 4000, or none at all)
    #[must_use]
    pub fn transport(code: Option<u16>) -> Self {
        Self {
            code,
            description: "Transport closed",
            explanation: "The underlying connection closed outside the gateway protocol.",
            reconnect: true,
            source: PolicySource::Transport,
        }
    }

    /// Policy for a close code that may be missing
    #[must_use]
    pub fn for_optional(code: Option<u16>) -> Self {
        code.map_or_else(|| Self::transport(None), Self::for_code)
    }
}
