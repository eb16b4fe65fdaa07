//! Transport abstraction
//!
//! The session runner talks to the network only through these traits. A
//! connection is split into a sink owned by the writer task and a stream read
//! by the runner loop.

mod memory;
mod ws;

pub use memory::{ClientFrame, MemoryConnector, ServerEnd};
pub use ws::WsConnector;

use async_trait::async_trait;
use thiserror::Error;

/// Something that arrived on the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete text or binary frame
    Frame(Vec<u8>),
    /// The peer closed the connection, with its close code if one was sent
    Closed(Option<u16>),
}

/// Transport failures; all of them are handled by reconnecting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("connection closed")]
    Closed,
}

/// Both halves of an open connection
pub type Connection = (Box<dyn FrameSink>, Box<dyn FrameStream>);

/// Opens connections to a URL
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;
}

/// Write half of a connection
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a close frame with `code` and shut the write half
    async fn close(&mut self, code: u16) -> Result<(), TransportError>;
}

/// Read half of a connection
#[async_trait]
pub trait FrameStream: Send {
    /// Next inbound item, `None` once the connection is gone
    ///
    /// Must be cancel safe; the runner polls it inside `tokio::select!`.
    async fn next(&mut self) -> Option<Result<Inbound, TransportError>>;
}
