//! Operation-specific payload decoding
//!
//! Second phase of the codec: turn a classified [`Envelope`] into a typed
//! [`GatewayEvent`], and turn a [`GatewayCommand`] into an envelope.

use crate::envelope::Envelope;
use crate::error::{DecodeError, DecodeResult, EncodeResult};
use crate::opcodes::Opcode;
use crate::payloads::{
    HelloPayload, IdentifyPayload, PresenceUpdatePayload, RequestGuildMembersPayload,
    ResumePayload, VoiceStateUpdatePayload,
};
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

/// Event name of the first dispatch of a fresh session
pub const READY_EVENT: &str = "READY";

/// Event name of the dispatch that ends a successful resume
pub const RESUMED_EVENT: &str = "RESUMED";

/// A dispatched event with its payload still undecoded
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    pub sequence: u64,
    pub name: String,
    pub data: Box<RawValue>,
}

impl DispatchEvent {
    /// Decode the event data into a concrete type
    pub fn decode_data<T: DeserializeOwned>(&self) -> DecodeResult<T> {
        decode_payload(Opcode::Dispatch, &self.data)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.name == READY_EVENT
    }

    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.name == RESUMED_EVENT
    }
}

impl From<DispatchEvent> for Envelope {
    fn from(event: DispatchEvent) -> Self {
        Envelope::dispatch(event.sequence, event.name, event.data)
    }
}

/// Commands the client sends to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCommand {
    /// Last sequence seen, `None` before the first dispatch
    Heartbeat(Option<u64>),
    Identify(IdentifyPayload),
    PresenceUpdate(PresenceUpdatePayload),
    VoiceStateUpdate(VoiceStateUpdatePayload),
    Resume(ResumePayload),
    RequestGuildMembers(RequestGuildMembersPayload),
}

impl GatewayCommand {
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Heartbeat(_) => Opcode::Heartbeat,
            Self::Identify(_) => Opcode::Identify,
            Self::PresenceUpdate(_) => Opcode::PresenceUpdate,
            Self::VoiceStateUpdate(_) => Opcode::VoiceStateUpdate,
            Self::Resume(_) => Opcode::Resume,
            Self::RequestGuildMembers(_) => Opcode::RequestGuildMembers,
        }
    }

    /// Wrap the command in an envelope
    ///
    /// Identify is validated here so an invalid handshake never reaches the wire.
    pub fn into_envelope(&self) -> EncodeResult<Envelope> {
        let op = self.opcode();
        match self {
            Self::Heartbeat(sequence) => Envelope::with_payload(op, sequence),
            Self::Identify(payload) => {
                payload.validate()?;
                Envelope::with_payload(op, payload)
            }
            Self::PresenceUpdate(payload) => Envelope::with_payload(op, payload),
            Self::VoiceStateUpdate(payload) => Envelope::with_payload(op, payload),
            Self::Resume(payload) => Envelope::with_payload(op, payload),
            Self::RequestGuildMembers(payload) => Envelope::with_payload(op, payload),
        }
    }

    /// Encode straight to a text frame
    pub fn to_json(&self) -> EncodeResult<String> {
        self.into_envelope()?.to_json()
    }
}

/// A fully decoded inbound frame
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Dispatch(DispatchEvent),
    /// Heartbeat, either a server request for one or a client beat
    Heartbeat(Option<u64>),
    Reconnect,
    InvalidSession {
        resumable: bool,
    },
    Hello(HelloPayload),
    HeartbeatAck,
    /// A client-only operation, seen when decoding what a client sent
    Command(GatewayCommand),
}

impl GatewayEvent {
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Dispatch(_) => Opcode::Dispatch,
            Self::Heartbeat(_) => Opcode::Heartbeat,
            Self::Reconnect => Opcode::Reconnect,
            Self::InvalidSession { .. } => Opcode::InvalidSession,
            Self::Hello(_) => Opcode::Hello,
            Self::HeartbeatAck => Opcode::HeartbeatAck,
            Self::Command(command) => command.opcode(),
        }
    }

    /// Decode a frame in both phases
    pub fn decode(bytes: &[u8]) -> DecodeResult<Self> {
        Envelope::decode(bytes)?.into_event()
    }
}

fn decode_payload<T: DeserializeOwned>(op: Opcode, raw: &RawValue) -> DecodeResult<T> {
    serde_json::from_str(raw.get()).map_err(|source| DecodeError::InvalidPayload { op, source })
}

fn require_payload<T: DeserializeOwned>(op: Opcode, raw: Option<&RawValue>) -> DecodeResult<T> {
    let raw = raw.ok_or(DecodeError::MissingPayload(op))?;
    decode_payload(op, raw)
}

impl Envelope {
    /// Decode `d` with the shape selected by the opcode
    pub fn into_event(self) -> DecodeResult<GatewayEvent> {
        let (op, payload, dispatch) = self.into_parts();
        let raw = payload.as_deref();

        let event = match op {
            Opcode::Dispatch => {
                let meta = dispatch.ok_or(DecodeError::MissingSequence)?;
                let data = payload.ok_or(DecodeError::MissingPayload(op))?;
                GatewayEvent::Dispatch(DispatchEvent {
                    sequence: meta.sequence,
                    name: meta.event,
                    data,
                })
            }
            Opcode::Heartbeat => {
                let sequence = match raw {
                    Some(raw) => decode_payload::<Option<u64>>(op, raw)?,
                    None => None,
                };
                GatewayEvent::Heartbeat(sequence)
            }
            Opcode::Reconnect => GatewayEvent::Reconnect,
            Opcode::InvalidSession => GatewayEvent::InvalidSession {
                resumable: require_payload(op, raw)?,
            },
            Opcode::Hello => GatewayEvent::Hello(require_payload(op, raw)?),
            Opcode::HeartbeatAck => GatewayEvent::HeartbeatAck,
            Opcode::Identify => {
                GatewayEvent::Command(GatewayCommand::Identify(require_payload(op, raw)?))
            }
            Opcode::PresenceUpdate => {
                GatewayEvent::Command(GatewayCommand::PresenceUpdate(require_payload(op, raw)?))
            }
            Opcode::VoiceStateUpdate => {
                GatewayEvent::Command(GatewayCommand::VoiceStateUpdate(require_payload(op, raw)?))
            }
            Opcode::Resume => GatewayEvent::Command(GatewayCommand::Resume(require_payload(op, raw)?)),
            Opcode::RequestGuildMembers => GatewayEvent::Command(
                GatewayCommand::RequestGuildMembers(require_payload(op, raw)?),
            ),
        };

        Ok(event)
    }
}
