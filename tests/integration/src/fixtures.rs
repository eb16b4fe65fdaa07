//! Test fixtures and frame builders
//!
//! Gateway-side frames as the tests send them.

use gateway_protocol::{ConnectionProperties, IdentifyPayload, Intents};
use serde_json::{json, Value};

/// Token every test session identifies with
pub const TEST_TOKEN: &str = "test-token";

/// Base URL the in-memory client first connects to
pub const BASE_URL: &str = "memory://gateway";

/// Resume URL announced in READY
pub const RESUME_URL: &str = "memory://resume";

/// Identify payload used by [`crate::TestGateway::start`]
pub fn identify() -> IdentifyPayload {
    IdentifyPayload::new(TEST_TOKEN, Intents::GUILDS | Intents::GUILD_MESSAGES)
        .with_properties(ConnectionProperties::new("linux", "integration", "integration"))
}

pub fn hello(heartbeat_interval: u64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": heartbeat_interval}})
}

pub fn ready(seq: u64, session_id: &str) -> Value {
    json!({
        "op": 0,
        "s": seq,
        "t": "READY",
        "d": {
            "v": 10,
            "user": {"id": "80351110224678912", "username": "tester"},
            "guilds": [],
            "session_id": session_id,
            "resume_gateway_url": RESUME_URL
        }
    })
}

pub fn dispatch(seq: u64, name: &str, data: Value) -> Value {
    json!({"op": 0, "s": seq, "t": name, "d": data})
}

pub fn heartbeat_ack() -> Value {
    json!({"op": 11})
}

pub fn heartbeat_request() -> Value {
    json!({"op": 1, "d": null})
}

pub fn reconnect() -> Value {
    json!({"op": 7, "d": null})
}

pub fn invalid_session(resumable: bool) -> Value {
    json!({"op": 9, "d": resumable})
}
