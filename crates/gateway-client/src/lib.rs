//! # gateway-client
//!
//! Client side of the gateway session: a sans-io handshake controller, the
//! heartbeat tracker, transport traits with WebSocket and in-memory adapters,
//! and an async runner that keeps a session alive across reconnects.

pub mod error;
pub mod runner;
pub mod session;
pub mod transport;

// Re-export commonly used types at crate root
pub use error::{SequenceRegression, SessionError, SessionResult};
pub use runner::{Backoff, GatewayClient, GatewayHandle, ReconnectConfig};
pub use session::{Command, DisconnectReason, HeartbeatTracker, SessionController, SessionState};
pub use transport::{
    ClientFrame, Connector, FrameSink, FrameStream, Inbound, MemoryConnector, ServerEnd,
    TransportError, WsConnector,
};
