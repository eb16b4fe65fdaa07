//! Protocol error types

use crate::opcodes::Opcode;
use thiserror::Error;

/// An envelope shell was recognised but its `op` is not in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown opcode: {0}")]
pub struct UnknownOpcode(pub u64);

/// A close code is not present in the catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("close code {0} is not in the catalogue")]
pub struct CloseCodeNotFound(pub u16);

/// An intents value carries bits outside the defined flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid intent bits {undefined:#x} in {bits:#x}")]
pub struct InvalidIntentBits {
    /// The full value that was validated
    pub bits: u32,
    /// The bits that are not assigned to any flag
    pub undefined: u32,
}

/// Errors raised while decoding an inbound frame
///
/// All of these are fatal to the frame only.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not a JSON envelope
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The `op` field is not a known opcode
    #[error(transparent)]
    UnknownOpcode(#[from] UnknownOpcode),

    /// A Dispatch envelope arrived without `s`
    #[error("dispatch envelope is missing its sequence")]
    MissingSequence,

    /// A Dispatch envelope arrived without `t`
    #[error("dispatch envelope is missing its event name")]
    MissingEventName,

    /// The opcode requires a `d` payload but none was sent
    #[error("{0} envelope is missing its payload")]
    MissingPayload(Opcode),

    /// The `d` payload does not match the shape the opcode requires
    #[error("invalid {op} payload: {source}")]
    InvalidPayload {
        op: Opcode,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while building or encoding an outbound frame
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Serialization failed
    #[error("failed to serialize {op} payload: {source}")]
    Serialize {
        op: Opcode,
        #[source]
        source: serde_json::Error,
    },

    /// A Dispatch envelope must be built with its sequence and event name
    #[error("dispatch envelopes require a sequence and event name")]
    DispatchWithoutMetadata,

    /// The handshake carries intents outside the defined flags
    #[error(transparent)]
    InvalidIntents(#[from] InvalidIntentBits),

    /// The shard id must be below the shard count
    #[error("invalid shard [{id}, {count}]")]
    InvalidShard { id: u32, count: u32 },

    /// The large threshold is outside 50..=250
    #[error("large threshold {0} is outside 50..=250")]
    InvalidLargeThreshold(u16),
}

/// Decode result type
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Encode result type
pub type EncodeResult<T> = Result<T, EncodeError>;
