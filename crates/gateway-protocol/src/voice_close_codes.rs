//! Voice connection close event codes
//!
//! The voice catalogue carries no reconnect flag; whether to reconnect a voice
//! connection is decided by the main gateway session.

use crate::error::CloseCodeNotFound;
use std::fmt;

/// Voice close event codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum VoiceCloseCode {
    UnknownOpcode = 4001,
    FailedDecode = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSession = 4006,
    SessionTimeout = 4009,
    ServerNotFound = 4011,
    UnknownProtocol = 4012,
    Disconnected = 4014,
    VoiceServerCrashed = 4015,
    UnknownEncryptionMode = 4016,
}

impl VoiceCloseCode {
    pub const ALL: [VoiceCloseCode; 12] = [
        Self::UnknownOpcode,
        Self::FailedDecode,
        Self::NotAuthenticated,
        Self::AuthenticationFailed,
        Self::AlreadyAuthenticated,
        Self::InvalidSession,
        Self::SessionTimeout,
        Self::ServerNotFound,
        Self::UnknownProtocol,
        Self::Disconnected,
        Self::VoiceServerCrashed,
        Self::UnknownEncryptionMode,
    ];

    /// Look a code up in the voice catalogue
    pub fn lookup(code: u16) -> Result<Self, CloseCodeNotFound> {
        Self::ALL
            .into_iter()
            .find(|known| known.as_u16() == code)
            .ok_or(CloseCodeNotFound(code))
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownOpcode => "Unknown opcode",
            Self::FailedDecode => "Failed to decode payload",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::InvalidSession => "Session no longer valid",
            Self::SessionTimeout => "Session timeout",
            Self::ServerNotFound => "Server not found",
            Self::UnknownProtocol => "Unknown protocol",
            Self::Disconnected => "Disconnected",
            Self::VoiceServerCrashed => "Voice server crashed",
            Self::UnknownEncryptionMode => "Unknown encryption mode",
        }
    }

    #[must_use]
    pub const fn explanation(self) -> &'static str {
        match self {
            Self::UnknownOpcode => "You sent an invalid opcode.",
            Self::FailedDecode => "You sent a invalid payload in your identifying to the Gateway.",
            Self::NotAuthenticated => "You sent a payload before identifying with the Gateway.",
            Self::AuthenticationFailed => "The token you sent in your identify payload is incorrect.",
            Self::AlreadyAuthenticated => "You sent more than one identify payload. Stahp.",
            Self::InvalidSession => "Your session is no longer valid.",
            Self::SessionTimeout => "Your session has timed out.",
            Self::ServerNotFound => "We can't find the server you're trying to connect to.",
            Self::UnknownProtocol => "We didn't recognize the protocol you sent.",
            Self::Disconnected => {
                "Channel was deleted, you were kicked, voice server changed, or the main gateway session was dropped. Don't reconnect."
            }
            Self::VoiceServerCrashed => "The server crashed. Our bad! Try resuming.",
            Self::UnknownEncryptionMode => "We didn't recognize your encryption.",
        }
    }
}

impl fmt::Display for VoiceCloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}
