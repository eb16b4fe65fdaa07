//! Test helpers for integration tests
//!
//! Spawns a [`GatewayClient`] on the in-memory transport and gives the test
//! the gateway side of every connection it opens.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use gateway_client::{
    ClientFrame, GatewayClient, GatewayHandle, MemoryConnector, ReconnectConfig, ServerEnd,
    SessionResult,
};
use gateway_protocol::{DispatchEvent, GatewayUrl, IdentifyPayload};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::fixtures::{self, BASE_URL};

/// How long any single expectation may take
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// A running client plus the scripted gateway it talks to
pub struct TestGateway {
    pub connector: MemoryConnector,
    pub handle: GatewayHandle,
    accepted: mpsc::UnboundedReceiver<ServerEnd>,
    events: mpsc::Receiver<DispatchEvent>,
    task: JoinHandle<SessionResult<()>>,
}

impl TestGateway {
    /// Start a client with the default test identify payload
    pub fn start() -> Result<Self> {
        Self::start_with(fixtures::identify(), fast_reconnect(), 0)
    }

    /// Start a client with custom settings, refusing the first `refusals` connects
    pub fn start_with(
        identify: IdentifyPayload,
        reconnect: ReconnectConfig,
        refusals: u32,
    ) -> Result<Self> {
        let (connector, accepted) = MemoryConnector::new();
        connector.refuse_next(refusals);

        let (client, events) =
            GatewayClient::new(connector.clone(), GatewayUrl::new(BASE_URL), identify)?;
        let client = client.with_reconnect(reconnect);
        let handle = client.handle();
        let task = tokio::spawn(client.run());

        Ok(Self {
            connector,
            handle,
            accepted,
            events,
            task,
        })
    }

    /// Wait for the client's next connection
    pub async fn accept(&mut self) -> Result<ServerEnd> {
        timeout(STEP_TIMEOUT, self.accepted.recv())
            .await
            .context("timed out waiting for a connection")?
            .context("client stopped connecting")
    }

    /// Accept a connection, send Hello and return the handshake the client sent
    pub async fn accept_and_handshake(&mut self, expected_op: u64) -> Result<(ServerEnd, Value)> {
        let mut server = self.accept().await?;
        server.send_json(&fixtures::hello(45_000));
        let handshake = expect_op(&mut server, expected_op).await?;
        Ok((server, handshake))
    }

    /// Wait for the next dispatch delivered to the application
    pub async fn next_event(&mut self) -> Result<DispatchEvent> {
        timeout(STEP_TIMEOUT, self.events.recv())
            .await
            .context("timed out waiting for a dispatch")?
            .context("event channel closed")
    }

    /// Wait for the client task to finish and return its result
    pub async fn finish(self) -> Result<SessionResult<()>> {
        let result = timeout(STEP_TIMEOUT, self.task)
            .await
            .context("client did not stop")??;
        Ok(result)
    }
}

/// Backoff short enough for tests
pub fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        multiplier: 2.0,
        max_delay: Duration::from_millis(100),
        max_attempts: Some(5),
        jitter: 0.0,
    }
}

/// Next client frame with the given opcode, skipping heartbeats
pub async fn expect_op(server: &mut ServerEnd, op: u64) -> Result<Value> {
    loop {
        let frame = timeout(STEP_TIMEOUT, server.recv())
            .await
            .with_context(|| format!("timed out waiting for op {op}"))?
            .with_context(|| format!("client hung up before op {op}"))?;

        match frame {
            ClientFrame::Text(text) => {
                let value: Value = serde_json::from_str(&text)?;
                if value["op"] == op {
                    return Ok(value);
                }
                if value["op"] != 1 {
                    bail!("expected op {op}, got {value}");
                }
            }
            ClientFrame::Close(code) => bail!("expected op {op}, got close {code}"),
        }
    }
}

/// Heartbeat carrying `seq`, skipping any scheduled beat sent before it
pub async fn expect_heartbeat(server: &mut ServerEnd, seq: u64) -> Result<Value> {
    loop {
        let heartbeat = expect_op(server, 1).await?;
        if heartbeat["d"] == seq {
            return Ok(heartbeat);
        }
    }
}

/// Next close frame from the client, skipping text frames
pub async fn expect_close(server: &mut ServerEnd) -> Result<u16> {
    loop {
        let frame = timeout(STEP_TIMEOUT, server.recv())
            .await
            .context("timed out waiting for close")?
            .context("client hung up without a close frame")?;

        if let ClientFrame::Close(code) = frame {
            return Ok(code);
        }
    }
}

/// Wait until the client drops its end of the connection
pub async fn expect_hangup(server: &mut ServerEnd) -> Result<()> {
    loop {
        let frame = timeout(STEP_TIMEOUT, server.recv())
            .await
            .context("timed out waiting for hang-up")?;
        if frame.is_none() {
            return Ok(());
        }
    }
}
