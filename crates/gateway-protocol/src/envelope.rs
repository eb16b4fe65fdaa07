//! Gateway envelope codec
//!
//! Every frame is a `{op, d, s, t}` JSON object. Decoding happens in two phases:
//! [`Envelope::decode`] parses the shell, classifies `op` and keeps `d` as raw
//! JSON; [`Envelope::into_event`](crate::events) then decodes `d` with the shape
//! the opcode selects.

use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::opcodes::Opcode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use std::fmt;

/// Sequence and event name, carried only by Dispatch envelopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMeta {
    pub sequence: u64,
    pub event: String,
}

/// A decoded or to-be-encoded gateway frame
///
/// Dispatch metadata is present if and only if the opcode is Dispatch; the
/// constructors make any other combination unrepresentable.
#[derive(Debug, Clone)]
pub struct Envelope {
    op: Opcode,
    payload: Option<Box<RawValue>>,
    dispatch: Option<DispatchMeta>,
}

/// The shell as it appears on the wire, before `op` is classified
#[derive(Deserialize)]
struct Shell {
    op: u64,
    #[serde(default, deserialize_with = "raw_keep_null")]
    d: Option<Box<RawValue>>,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Serialize)]
struct WireEnvelope<'a> {
    op: Opcode,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<&'a RawValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    t: Option<&'a str>,
}

// A present `"d": null` stays distinguishable from an absent `d`
fn raw_keep_null<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

impl Envelope {
    /// Build a non-Dispatch envelope
    pub fn new(op: Opcode, payload: Option<Box<RawValue>>) -> EncodeResult<Self> {
        if op == Opcode::Dispatch {
            return Err(EncodeError::DispatchWithoutMetadata);
        }
        Ok(Self {
            op,
            payload,
            dispatch: None,
        })
    }

    /// Build a non-Dispatch envelope by serializing `payload`
    pub fn with_payload<T: Serialize>(op: Opcode, payload: &T) -> EncodeResult<Self> {
        let raw = serde_json::value::to_raw_value(payload)
            .map_err(|source| EncodeError::Serialize { op, source })?;
        Self::new(op, Some(raw))
    }

    /// Build a Dispatch envelope
    #[must_use]
    pub fn dispatch(sequence: u64, event: impl Into<String>, payload: Box<RawValue>) -> Self {
        Self {
            op: Opcode::Dispatch,
            payload: Some(payload),
            dispatch: Some(DispatchMeta {
                sequence,
                event: event.into(),
            }),
        }
    }

    /// Decode the envelope shell and classify its opcode
    ///
    /// `d` is kept as raw JSON. `s` and `t` are required for Dispatch and ignored
    /// for every other opcode.
    pub fn decode(bytes: &[u8]) -> DecodeResult<Self> {
        let shell: Shell = serde_json::from_slice(bytes).map_err(DecodeError::Malformed)?;
        let op = Opcode::classify(shell.op)?;

        let dispatch = if op == Opcode::Dispatch {
            Some(DispatchMeta {
                sequence: shell.s.ok_or(DecodeError::MissingSequence)?,
                event: shell.t.ok_or(DecodeError::MissingEventName)?,
            })
        } else {
            None
        };

        Ok(Self {
            op,
            payload: shell.d,
            dispatch,
        })
    }

    /// Encode to wire bytes, omitting absent fields
    pub fn encode(&self) -> EncodeResult<Vec<u8>> {
        serde_json::to_vec(&self.wire()).map_err(|source| EncodeError::Serialize {
            op: self.op,
            source,
        })
    }

    /// Encode to a text frame
    pub fn to_json(&self) -> EncodeResult<String> {
        serde_json::to_string(&self.wire()).map_err(|source| EncodeError::Serialize {
            op: self.op,
            source,
        })
    }

    fn wire(&self) -> WireEnvelope<'_> {
        WireEnvelope {
            op: self.op,
            d: self.payload.as_deref(),
            s: self.dispatch.as_ref().map(|meta| meta.sequence),
            t: self.dispatch.as_ref().map(|meta| meta.event.as_str()),
        }
    }

    #[must_use]
    pub fn op(&self) -> Opcode {
        self.op
    }

    /// The raw `d` payload, if one was present
    #[must_use]
    pub fn payload(&self) -> Option<&RawValue> {
        self.payload.as_deref()
    }

    #[must_use]
    pub fn dispatch_meta(&self) -> Option<&DispatchMeta> {
        self.dispatch.as_ref()
    }

    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.dispatch.as_ref().map(|meta| meta.sequence)
    }

    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        self.dispatch.as_ref().map(|meta| meta.event.as_str())
    }

    pub(crate) fn into_parts(self) -> (Opcode, Option<Box<RawValue>>, Option<DispatchMeta>) {
        (self.op, self.payload, self.dispatch)
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op
            && self.dispatch == other.dispatch
            && self.payload.as_deref().map(RawValue::get) == other.payload.as_deref().map(RawValue::get)
    }
}

impl Eq for Envelope {}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dispatch {
            Some(meta) => write!(f, "Envelope(op={}, t={}, s={})", self.op, meta.event, meta.sequence),
            None => write!(f, "Envelope(op={})", self.op),
        }
    }
}
