//! # gateway-protocol
//!
//! Wire vocabulary of the gateway: opcodes, close-code catalogues, the intents
//! bitmask, handshake payloads and the two-phase envelope codec.
//! Everything here is pure data and lookup; no I/O.

pub mod close_codes;
pub mod envelope;
pub mod error;
pub mod events;
pub mod intents;
pub mod opcodes;
pub mod payloads;
pub mod snowflake;
pub mod url;
pub mod voice_close_codes;

// Re-export commonly used types at crate root
pub use close_codes::{ClosePolicy, CloseCode, PolicySource, GATEWAY_CLOSE_CODE_MIN};
pub use envelope::{DispatchMeta, Envelope};
pub use error::{
    CloseCodeNotFound, DecodeError, DecodeResult, EncodeError, EncodeResult, InvalidIntentBits,
    UnknownOpcode,
};
pub use events::{DispatchEvent, GatewayCommand, GatewayEvent, READY_EVENT, RESUMED_EVENT};
pub use intents::{IntentFlag, Intents};
pub use opcodes::Opcode;
pub use payloads::{
    Activity, ConnectionProperties, HelloPayload, IdentifyPayload, PresenceUpdatePayload,
    ReadyPayload, RequestGuildMembersPayload, ResumePayload, ShardInfo, Status,
    VoiceStateUpdatePayload,
};
pub use snowflake::Snowflake;
pub use url::{GatewayUrl, DEFAULT_API_VERSION};
pub use voice_close_codes::VoiceCloseCode;
