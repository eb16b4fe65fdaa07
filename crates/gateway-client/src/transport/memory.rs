//! In-memory transport
//!
//! Every successful `connect` hands a [`ServerEnd`] to the test through a
//! channel, so a test can script the gateway side of each connection.

use super::{Connection, Connector, FrameSink, FrameStream, Inbound, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What the client wrote on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Text(String),
    Close(u16),
}

/// Connector whose connections terminate in the test process
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept: mpsc::UnboundedSender<ServerEnd>,
    refusals: Arc<AtomicU32>,
}

impl MemoryConnector {
    /// Create a connector and the receiver of its server ends
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accept, accepted) = mpsc::unbounded_channel();
        let connector = Self {
            accept,
            refusals: Arc::new(AtomicU32::new(0)),
        };
        (connector, accepted)
    }

    /// Fail the next `count` connection attempts
    pub fn refuse_next(&self, count: u32) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    fn take_refusal(&self) -> bool {
        self.refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        if self.take_refusal() {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let server = ServerEnd {
            url: url.to_string(),
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        self.accept
            .send(server)
            .map_err(|_| TransportError::Connect("no server is accepting".to_string()))?;

        Ok((
            Box::new(MemorySink {
                outbound: outbound_tx,
            }),
            Box::new(MemoryStream {
                inbound: inbound_rx,
            }),
        ))
    }
}

/// The gateway side of one in-memory connection
#[derive(Debug)]
pub struct ServerEnd {
    url: String,
    inbound: mpsc::UnboundedSender<Inbound>,
    outbound: mpsc::UnboundedReceiver<ClientFrame>,
}

impl ServerEnd {
    /// URL the client connected to
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a JSON frame to the client
    pub fn send_json(&self, value: &serde_json::Value) {
        self.send_raw(value.to_string().into_bytes());
    }

    /// Deliver raw bytes to the client
    pub fn send_raw(&self, bytes: Vec<u8>) {
        let _ = self.inbound.send(Inbound::Frame(bytes));
    }

    /// Close the connection from the gateway side
    pub fn close(&self, code: Option<u16>) {
        let _ = self.inbound.send(Inbound::Closed(code));
    }

    /// Next frame written by the client, `None` once the client hung up
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        self.outbound.recv().await
    }

    /// Next text frame from the client parsed as JSON
    ///
    /// Returns `None` on a close frame or a hang-up.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        match self.recv().await? {
            ClientFrame::Text(text) => serde_json::from_str(&text).ok(),
            ClientFrame::Close(_) => None,
        }
    }
}

struct MemorySink {
    outbound: mpsc::UnboundedSender<ClientFrame>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(ClientFrame::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        self.outbound
            .send(ClientFrame::Close(code))
            .map_err(|_| TransportError::Closed)
    }
}

struct MemoryStream {
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next(&mut self) -> Option<Result<Inbound, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }
}
