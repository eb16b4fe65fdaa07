//! Async session runner
//!
//! Owns the [`SessionController`] and executes its commands against a
//! transport. Per connection, a single writer task owns the sink and drains an
//! mpsc channel; the runner loop is the only reader.
//!
//! Dispatches wait in a local backlog while the application's event channel
//! is full, so a slow consumer never stalls heartbeats or shutdown.

use super::backoff::{Backoff, ReconnectConfig};
use crate::error::{SessionError, SessionResult};
use crate::session::{Command, SessionController, SessionState};
use crate::transport::{Connection, Connector, FrameSink, FrameStream, Inbound};
use gateway_protocol::{DispatchEvent, GatewayCommand, GatewayUrl, IdentifyPayload};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Channel buffer size for outgoing frames
const OUTBOUND_BUFFER_SIZE: usize = 100;

/// Channel buffer size for delivered dispatches
const EVENT_BUFFER_SIZE: usize = 256;

/// Log a warning each time the undelivered backlog grows by this much
const BACKLOG_WARN_STEP: usize = 1024;

/// Channel buffer size for application commands
const COMMAND_BUFFER_SIZE: usize = 32;

/// Frames for the writer task
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close(u16),
}

/// What the runner does once a connection ends
enum Next {
    Reconnect {
        url: Option<String>,
        /// The session reached `Connected` on this connection
        established: bool,
    },
    Shutdown,
}

/// Cloneable handle for controlling a running client
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    shutdown: Arc<watch::Sender<bool>>,
    commands: mpsc::Sender<GatewayCommand>,
}

impl GatewayHandle {
    /// Ask the client to close with 1000 and stop
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Queue a command such as a presence update
    ///
    /// Returns false when the client has stopped.
    pub async fn send(&self, command: GatewayCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }
}

/// Gateway client driving one session across reconnects
pub struct GatewayClient<C> {
    connector: C,
    url: GatewayUrl,
    controller: SessionController,
    reconnect: ReconnectConfig,
    events: mpsc::Sender<DispatchEvent>,
    backlog: VecDeque<DispatchEvent>,
    commands: mpsc::Receiver<GatewayCommand>,
    shutdown: watch::Receiver<bool>,
    handle: GatewayHandle,
}

impl<C: Connector> GatewayClient<C> {
    /// Create a client and the receiver its dispatches are delivered to
    ///
    /// Fails before any network activity if the Identify payload is invalid.
    pub fn new(
        connector: C,
        url: GatewayUrl,
        identify: IdentifyPayload,
    ) -> SessionResult<(Self, mpsc::Receiver<DispatchEvent>)> {
        let controller = SessionController::new(identify)?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let client = Self {
            connector,
            url,
            controller,
            reconnect: ReconnectConfig::default(),
            events: events_tx,
            backlog: VecDeque::new(),
            commands: commands_rx,
            shutdown: shutdown_rx,
            handle: GatewayHandle {
                shutdown: Arc::new(shutdown_tx),
                commands: commands_tx,
            },
        };
        Ok((client, events_rx))
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    #[must_use]
    pub fn handle(&self) -> GatewayHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Run until shutdown or a terminal error
    ///
    /// Returns `Ok` after a requested shutdown and `Err` when the gateway
    /// closed with a code that forbids reconnecting or retries ran out.
    ///
    /// The backoff counts consecutive connections that never reached
    /// `Connected`, whether the connect itself failed or the gateway closed
    /// the socket before the first Dispatch. It resets once a session is up.
    pub async fn run(mut self) -> SessionResult<()> {
        let mut backoff = Backoff::new(self.reconnect.clone());
        let mut url = self.url.to_string();

        loop {
            if *self.shutdown.borrow() {
                tracing::info!("Shutdown requested before connecting");
                return Ok(());
            }

            let Some((sink, stream)) = self.connect(&url, &mut backoff).await? else {
                return Ok(());
            };
            self.controller.connect()?;

            match self.drive(sink, stream, &mut backoff).await? {
                Next::Reconnect {
                    url: resume_url,
                    established,
                } => {
                    url = match resume_url {
                        Some(base) => self.url.rebase(base).to_string(),
                        None => self.url.to_string(),
                    };

                    if !established {
                        let Some(delay) = backoff.next_delay() else {
                            tracing::error!(
                                attempts = backoff.attempts(),
                                "Giving up, sessions keep closing before they start"
                            );
                            return Err(SessionError::ReconnectExhausted {
                                attempts: backoff.attempts(),
                            });
                        };
                        tracing::warn!(
                            attempt = backoff.attempts(),
                            delay_ms = delay.as_millis(),
                            "Connection closed before the session started, backing off"
                        );
                        if self.sleep_or_shutdown(delay).await {
                            return Ok(());
                        }
                    }

                    tracing::info!(url = %url, state = %self.controller.state(), "Reconnecting");
                }
                Next::Shutdown => {
                    tracing::info!("Session closed");
                    return Ok(());
                }
            }
        }
    }

    /// Connect with backoff; `None` if shutdown was requested while waiting
    async fn connect(
        &mut self,
        url: &str,
        backoff: &mut Backoff,
    ) -> SessionResult<Option<Connection>> {
        loop {
            match self.connector.connect(url).await {
                Ok(connection) => {
                    if backoff.attempts() > 0 {
                        tracing::info!(attempts = backoff.attempts(), "Connected after retrying");
                    }
                    return Ok(Some(connection));
                }
                Err(e) => {
                    let Some(delay) = backoff.next_delay() else {
                        tracing::error!(error = %e, attempts = backoff.attempts(), "Giving up on connecting");
                        return Err(e.into());
                    };
                    tracing::warn!(
                        error = %e,
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis(),
                        "Connect failed, retrying"
                    );

                    if self.sleep_or_shutdown(delay).await {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Sleep for `delay`; true if shutdown was requested meanwhile
    async fn sleep_or_shutdown(&mut self, delay: Duration) -> bool {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return false,
                changed = self.shutdown.changed() => {
                    // A closed channel means every handle is gone; finish the wait
                    if changed.is_err() {
                        (&mut sleep).await;
                        return false;
                    }
                    if *self.shutdown.borrow() {
                        return true;
                    }
                }
            }
        }
    }

    /// Run one connection to completion
    async fn drive(
        &mut self,
        sink: Box<dyn FrameSink>,
        mut stream: Box<dyn FrameStream>,
        backoff: &mut Backoff,
    ) -> SessionResult<Next> {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        let writer = tokio::spawn(write_loop(sink, outbound_rx));
        let mut heartbeat: Option<Interval> = None;
        let mut established = false;

        let outcome = loop {
            let commands = tokio::select! {
                inbound = stream.next() => match inbound {
                    Some(Ok(Inbound::Frame(bytes))) => Ok(self.controller.handle_frame(&bytes)),
                    Some(Ok(Inbound::Closed(code))) => self.controller.handle_close(code),
                    Some(Err(e)) => Ok(self.controller.handle_transport_error(e.into())),
                    None => self.controller.handle_close(None),
                },
                () = next_heartbeat(&mut heartbeat) => Ok(self.controller.heartbeat_due()),
                Some(command) = self.commands.recv() => match self.controller.send_command(command) {
                    Ok(command) => Ok(vec![command]),
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping application command");
                        Ok(Vec::new())
                    }
                },
                permit = self.events.reserve(), if !self.backlog.is_empty() => {
                    match permit {
                        Ok(permit) => {
                            if let Some(event) = self.backlog.pop_front() {
                                permit.send(event);
                            }
                        }
                        Err(_) => {
                            tracing::trace!(dropped = self.backlog.len(), "Event receiver dropped");
                            self.backlog.clear();
                        }
                    }
                    Ok(Vec::new())
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        Ok(self.controller.shutdown())
                    } else {
                        Ok(Vec::new())
                    }
                }
            };

            let commands = match commands {
                Ok(commands) => commands,
                Err(e) => break Err(e),
            };

            if !established && matches!(self.controller.state(), SessionState::Connected { .. }) {
                established = true;
                if backoff.attempts() > 0 {
                    tracing::debug!(attempts = backoff.attempts(), "Session up, backoff reset");
                }
                backoff.reset();
            }

            if let Some(next) = self
                .execute(commands, &outbound_tx, &mut heartbeat, established)
                .await
            {
                break Ok(next);
            }
        };

        // The next connection starts only after this one is fully torn down
        drop(heartbeat);
        drop(outbound_tx);
        join_writer(writer).await;

        outcome
    }

    /// Perform controller commands in order; `Some` ends the connection
    async fn execute(
        &mut self,
        commands: Vec<Command>,
        outbound: &mpsc::Sender<Outbound>,
        heartbeat: &mut Option<Interval>,
        established: bool,
    ) -> Option<Next> {
        let mut next = None;

        for command in commands {
            match command {
                Command::Send(command) => match command.to_json() {
                    Ok(text) => {
                        if outbound.send(Outbound::Text(text)).await.is_err() {
                            tracing::warn!(op = %command.opcode(), "Writer gone, frame dropped");
                        }
                    }
                    Err(e) => {
                        tracing::error!(op = %command.opcode(), error = %e, "Failed to encode command");
                    }
                },
                Command::StartHeartbeat {
                    interval,
                    initial_delay,
                } => {
                    let mut timer = time::interval_at(Instant::now() + initial_delay, interval);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    *heartbeat = Some(timer);
                }
                Command::StopHeartbeat => *heartbeat = None,
                Command::Reconnect { close_code, url } => {
                    if let Some(code) = close_code {
                        let _ = outbound.send(Outbound::Close(code)).await;
                    }
                    next = Some(Next::Reconnect { url, established });
                }
                Command::Close { code } => {
                    let _ = outbound.send(Outbound::Close(code)).await;
                    next = Some(Next::Shutdown);
                }
                Command::Deliver(event) => self.deliver(event),
            }
        }

        next
    }

    /// Hand a dispatch to the application without waiting on it
    fn deliver(&mut self, event: DispatchEvent) {
        if self.events.is_closed() {
            tracing::trace!(dropped = self.backlog.len() + 1, "Event receiver dropped");
            self.backlog.clear();
            return;
        }

        if self.backlog.is_empty() {
            match self.events.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Closed(_)) => {
                    tracing::trace!("Event receiver dropped");
                    return;
                }
                Err(TrySendError::Full(event)) => self.backlog.push_back(event),
            }
        } else {
            self.backlog.push_back(event);
        }

        if self.backlog.len() % BACKLOG_WARN_STEP == 0 {
            tracing::warn!(
                backlog = self.backlog.len(),
                "Event consumer is falling behind"
            );
        }
    }
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Single writer: owns the sink until the channel closes or a close is sent
async fn write_loop(mut sink: Box<dyn FrameSink>, mut outbound: mpsc::Receiver<Outbound>) {
    while let Some(frame) = outbound.recv().await {
        match frame {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(text).await {
                    tracing::warn!(error = %e, "Failed to write frame");
                    break;
                }
            }
            Outbound::Close(code) => {
                if let Err(e) = sink.close(code).await {
                    tracing::debug!(error = %e, close_code = code, "Close frame not delivered");
                }
                return;
            }
        }
    }
}

async fn join_writer(writer: JoinHandle<()>) {
    if let Err(e) = writer.await {
        tracing::warn!(error = %e, "Writer task failed");
    }
}
