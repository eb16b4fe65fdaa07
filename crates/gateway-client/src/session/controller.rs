//! Session handshake controller
//!
//! A sans-io state machine. It consumes decoded gateway events, transport
//! closures and heartbeat ticks, and answers with [`Command`]s for the runner
//! to execute. It never touches a socket or a timer itself.

use super::heartbeat::HeartbeatTracker;
use super::state::{
    Command, DisconnectReason, SessionState, NORMAL_CLOSE_CODE, RESUMABLE_CLOSE_CODE,
};
use crate::error::{SequenceRegression, SessionError, SessionResult};
use gateway_protocol::{
    CloseCode, ClosePolicy, DecodeError, DispatchEvent, GatewayCommand, GatewayEvent,
    HelloPayload, IdentifyPayload, Opcode, PolicySource, ReadyPayload, ResumePayload,
};

/// A session the gateway may let us resume
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResumableSession {
    session_id: String,
    resume_gateway_url: Option<String>,
}

/// Which handshake to send after the next Hello
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    Identify,
    Resume,
}

/// Drives Identify, heartbeat and Resume across reconnects
#[derive(Debug)]
pub struct SessionController {
    identify: IdentifyPayload,
    state: SessionState,
    session: Option<ResumableSession>,
    last_sequence: Option<u64>,
    handshake: Handshake,
    heartbeat: HeartbeatTracker,
    regressions: u64,
    last_regression: Option<SequenceRegression>,
    last_disconnect: Option<DisconnectReason>,
}

impl SessionController {
    /// Create a controller for a fresh session
    ///
    /// The Identify payload is validated here, so bad intents are reported
    /// before any network activity.
    pub fn new(identify: IdentifyPayload) -> SessionResult<Self> {
        identify.validate()?;

        Ok(Self {
            identify,
            state: SessionState::Disconnected,
            session: None,
            last_sequence: None,
            handshake: Handshake::Identify,
            heartbeat: HeartbeatTracker::new(),
            regressions: 0,
            last_regression: None,
            last_disconnect: None,
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.session_id.as_str())
    }

    /// Resume URL announced in READY, if any
    #[must_use]
    pub fn resume_gateway_url(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|s| s.resume_gateway_url.as_deref())
    }

    #[must_use]
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Number of non-increasing dispatch sequences seen
    #[must_use]
    pub fn sequence_regressions(&self) -> u64 {
        self.regressions
    }

    #[must_use]
    pub fn last_regression(&self) -> Option<SequenceRegression> {
        self.last_regression
    }

    #[must_use]
    pub fn heartbeat(&self) -> &HeartbeatTracker {
        &self.heartbeat
    }

    #[must_use]
    pub fn last_disconnect(&self) -> Option<&DisconnectReason> {
        self.last_disconnect.as_ref()
    }

    /// Whether the held session can be resumed
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session.is_some() && self.last_sequence.is_some()
    }

    /// The transport connected; wait for Hello
    pub fn connect(&mut self) -> SessionResult<()> {
        self.handshake = match self.state {
            SessionState::Aborted => return Err(SessionError::Aborted),
            SessionState::Resuming if self.can_resume() => Handshake::Resume,
            SessionState::Disconnected
            | SessionState::Resuming
            | SessionState::Reidentifying => Handshake::Identify,
            state => {
                return Err(SessionError::InvalidTransition {
                    action: "connect",
                    state,
                })
            }
        };

        tracing::debug!(
            from = %self.state,
            handshake = ?self.handshake,
            "Transport connected, awaiting Hello"
        );
        self.state = SessionState::AwaitingHello;
        Ok(())
    }

    /// Decode and handle one inbound frame
    ///
    /// Undecodable frames and unknown opcodes are logged and dropped; the
    /// connection stays open.
    pub fn handle_frame(&mut self, bytes: &[u8]) -> Vec<Command> {
        match GatewayEvent::decode(bytes) {
            Ok(event) => self.handle_event(event),
            Err(DecodeError::UnknownOpcode(unknown)) => {
                tracing::warn!(op = unknown.0, "Dropping frame with unknown opcode");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable frame");
                Vec::new()
            }
        }
    }

    /// Handle a decoded gateway event
    pub fn handle_event(&mut self, event: GatewayEvent) -> Vec<Command> {
        if !self.state.is_live() {
            tracing::debug!(state = %self.state, op = %event.opcode(), "Ignoring event outside a live connection");
            return Vec::new();
        }

        tracing::trace!(op = %event.opcode(), state = %self.state, "Gateway event");

        match event {
            GatewayEvent::Hello(hello) => self.on_hello(hello),
            GatewayEvent::Dispatch(dispatch) => self.on_dispatch(dispatch),
            GatewayEvent::HeartbeatAck => {
                self.heartbeat.record_ack();
                tracing::trace!(latency = ?self.heartbeat.latency(), "Heartbeat acknowledged");
                Vec::new()
            }
            GatewayEvent::Heartbeat(_) => {
                tracing::debug!("Gateway requested a heartbeat");
                vec![Command::Send(GatewayCommand::Heartbeat(self.last_sequence))]
            }
            GatewayEvent::Reconnect => {
                tracing::info!(session_id = ?self.session_id(), "Gateway requested reconnect");
                self.disconnect(DisconnectReason::ReconnectRequested, true)
            }
            GatewayEvent::InvalidSession { resumable } => {
                tracing::info!(resumable, session_id = ?self.session_id(), "Session invalidated");
                if !resumable {
                    self.discard_session();
                }
                self.disconnect(DisconnectReason::InvalidSession { resumable }, true)
            }
            GatewayEvent::Command(command) => {
                tracing::warn!(op = %command.opcode(), "Ignoring client-only operation from gateway");
                Vec::new()
            }
        }
    }

    /// The heartbeat timer fired
    ///
    /// Sends a heartbeat, or treats the connection as zombied when the
    /// previous one was never acknowledged.
    pub fn heartbeat_due(&mut self) -> Vec<Command> {
        if !self.state.is_live() || !self.heartbeat.is_running() {
            return Vec::new();
        }

        if !self.heartbeat.is_acked() {
            let interval = self.heartbeat.interval().unwrap_or_default();
            tracing::warn!(
                session_id = ?self.session_id(),
                interval_ms = interval.as_millis(),
                "Connection zombied (heartbeat not ACKed)"
            );
            return self.disconnect(
                DisconnectReason::Failed(SessionError::ZombieConnection { interval }),
                true,
            );
        }

        self.heartbeat.record_sent();
        tracing::trace!(seq = ?self.last_sequence, "Sending heartbeat");
        vec![Command::Send(GatewayCommand::Heartbeat(self.last_sequence))]
    }

    /// The transport closed, with the peer's close code if it sent one
    ///
    /// Returns an error when the code forbids reconnecting; the session is
    /// then aborted and will refuse to connect again.
    pub fn handle_close(&mut self, code: Option<u16>) -> SessionResult<Vec<Command>> {
        if !self.state.is_live() {
            tracing::debug!(state = %self.state, close_code = ?code, "Ignoring close outside a live connection");
            return Ok(Vec::new());
        }

        let policy = ClosePolicy::for_optional(code);
        match policy.source {
            PolicySource::Catalogue(close) => tracing::info!(
                close_code = close.as_u16(),
                description = policy.description,
                reconnect = policy.reconnect,
                "Gateway closed the connection"
            ),
            PolicySource::Unrecognized => tracing::warn!(
                close_code = ?policy.code,
                "Gateway closed with an unrecognized code, reconnecting"
            ),
            PolicySource::Transport => tracing::info!(
                close_code = ?policy.code,
                "Transport closed"
            ),
        }

        if policy.reconnect {
            // The gateway rejected our sequence, so resuming with it again cannot succeed
            if policy.source == PolicySource::Catalogue(CloseCode::InvalidSeq) {
                self.discard_session();
            }
            return Ok(self.disconnect(DisconnectReason::Closed(policy), false));
        }

        let error = SessionError::NonReconnectableClose {
            code: policy.code.unwrap_or_default(),
            description: policy.description,
            explanation: policy.explanation,
        };
        tracing::error!(error = %error, "Session aborted");

        self.heartbeat.stop();
        self.discard_session();
        self.state = SessionState::Aborted;
        self.last_disconnect = Some(DisconnectReason::Closed(policy));
        Err(error)
    }

    /// The transport failed while reading or writing
    pub fn handle_transport_error(&mut self, error: SessionError) -> Vec<Command> {
        if !self.state.is_live() {
            return Vec::new();
        }
        tracing::warn!(error = %error, "Transport failure, reconnecting");
        self.disconnect(DisconnectReason::Failed(error), false)
    }

    /// Validate an application command for sending
    ///
    /// Handshake and heartbeat operations belong to the session and are
    /// rejected, as is anything sent before the session is connected.
    pub fn send_command(&self, command: GatewayCommand) -> SessionResult<Command> {
        let op = command.opcode();
        if matches!(op, Opcode::Identify | Opcode::Resume | Opcode::Heartbeat) {
            return Err(SessionError::ReservedCommand(op));
        }
        if !matches!(self.state, SessionState::Connected { .. }) {
            return Err(SessionError::InvalidTransition {
                action: "send a command",
                state: self.state,
            });
        }
        Ok(Command::Send(command))
    }

    /// Stop heartbeating, close with 1000 and forget the session
    ///
    /// Valid from any state. The runner does not reconnect afterwards.
    pub fn shutdown(&mut self) -> Vec<Command> {
        tracing::info!(state = %self.state, session_id = ?self.session_id(), "Shutting down session");

        self.heartbeat.stop();
        self.discard_session();
        self.state = SessionState::Disconnected;
        self.last_disconnect = Some(DisconnectReason::Shutdown);

        vec![
            Command::StopHeartbeat,
            Command::Close {
                code: NORMAL_CLOSE_CODE,
            },
        ]
    }

    fn on_hello(&mut self, hello: HelloPayload) -> Vec<Command> {
        if self.state != SessionState::AwaitingHello {
            tracing::warn!(state = %self.state, "Unexpected Hello, ignoring");
            return Vec::new();
        }

        let interval = hello.interval();
        let initial_delay = self.heartbeat.start(interval);
        let handshake = self.handshake_command();

        tracing::info!(
            heartbeat_interval_ms = hello.heartbeat_interval,
            handshake = %handshake.opcode(),
            "Hello received"
        );

        self.state = SessionState::Identifying;
        vec![
            Command::StartHeartbeat {
                interval: self.heartbeat.interval().unwrap_or(interval),
                initial_delay,
            },
            Command::Send(handshake),
        ]
    }

    fn handshake_command(&mut self) -> GatewayCommand {
        if self.handshake == Handshake::Resume {
            if let (Some(session), Some(seq)) = (&self.session, self.last_sequence) {
                return GatewayCommand::Resume(ResumePayload {
                    token: self.identify.token.clone(),
                    session_id: session.session_id.clone(),
                    seq,
                });
            }
        }

        self.handshake = Handshake::Identify;
        self.discard_session();
        GatewayCommand::Identify(self.identify.clone())
    }

    fn on_dispatch(&mut self, dispatch: DispatchEvent) -> Vec<Command> {
        let previous = match self.state {
            SessionState::Connected { sequence } => sequence,
            SessionState::Identifying => {
                self.state = SessionState::Connected { sequence: 0 };
                self.last_sequence.unwrap_or(0)
            }
            state => {
                tracing::warn!(state = %state, event = %dispatch.name, "Dispatch before Hello, dropping");
                return Vec::new();
            }
        };

        let received = dispatch.sequence;
        if received <= previous && previous > 0 {
            let regression = SequenceRegression { previous, received };
            self.regressions += 1;
            self.last_regression = Some(regression);
            tracing::warn!(
                previous,
                received,
                event = %dispatch.name,
                count = self.regressions,
                "{regression}"
            );
        }

        let sequence = previous.max(received);
        self.state = SessionState::Connected { sequence };
        self.last_sequence = Some(sequence);

        if dispatch.is_ready() {
            self.on_ready(&dispatch);
        } else if dispatch.is_resumed() {
            tracing::info!(session_id = ?self.session_id(), seq = sequence, "Session resumed");
        }

        vec![Command::Deliver(dispatch)]
    }

    fn on_ready(&mut self, dispatch: &DispatchEvent) {
        match dispatch.decode_data::<ReadyPayload>() {
            Ok(ready) => {
                tracing::info!(
                    session_id = %ready.session_id,
                    resume_url = ?ready.resume_gateway_url,
                    "Session ready"
                );
                self.session = Some(ResumableSession {
                    session_id: ready.session_id,
                    resume_gateway_url: ready.resume_gateway_url,
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "READY payload without a usable session id");
            }
        }
    }

    /// Leave the live connection and decide resume or re-identify
    ///
    /// `transport_open` is false when the transport already closed, so no
    /// close frame is needed.
    fn disconnect(&mut self, reason: DisconnectReason, transport_open: bool) -> Vec<Command> {
        let from = self.state;
        self.heartbeat.stop();

        let resume = self.can_resume();
        self.state = if resume {
            SessionState::Resuming
        } else {
            SessionState::Reidentifying
        };

        let close_code = transport_open.then_some(if resume {
            RESUMABLE_CLOSE_CODE
        } else {
            NORMAL_CLOSE_CODE
        });
        let url = if resume {
            self.resume_gateway_url().map(str::to_string)
        } else {
            None
        };

        tracing::info!(
            reason = %reason,
            from = %from,
            next = %self.state,
            session_id = ?self.session_id(),
            seq = ?self.last_sequence,
            "Disconnecting"
        );
        self.last_disconnect = Some(reason);

        vec![
            Command::StopHeartbeat,
            Command::Reconnect { close_code, url },
        ]
    }

    fn discard_session(&mut self) {
        self.session = None;
        self.last_sequence = None;
    }
}
