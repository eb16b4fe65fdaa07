//! WebSocket transport over tokio-tungstenite

use super::{Connection, Connector, FrameSink, FrameStream, Inbound, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects with `tokio_tungstenite::connect_async`, TLS via rustls
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (socket, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = socket.split();
        Ok((Box::new(WsSink { sink }), Box::new(WsStream { stream })))
    }
}

struct WsSink {
    sink: SplitSink<Socket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Borrowed(""),
        };

        match self.sink.send(Message::Close(Some(frame))).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {}
            Err(e) => return Err(TransportError::Send(e.to_string())),
        }

        // Flushes the close frame; an already closed socket is not an error here
        match self.sink.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(TransportError::Send(e.to_string())),
        }
    }
}

struct WsStream {
    stream: SplitStream<Socket>,
}

#[async_trait]
impl FrameStream for WsStream {
    async fn next(&mut self) -> Option<Result<Inbound, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Some(Ok(Inbound::Closed(None)));
                }
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            };

            match message {
                Message::Text(text) => return Some(Ok(Inbound::Frame(text.into_bytes()))),
                Message::Binary(bytes) => return Some(Ok(Inbound::Frame(bytes))),
                Message::Close(frame) => {
                    let code = frame.map(|frame| u16::from(frame.code));
                    tracing::debug!(close_code = ?code, "Close frame received");
                    return Some(Ok(Inbound::Closed(code)));
                }
                // Pings are answered by tungstenite on the next write or flush
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    tracing::trace!("Control frame received");
                }
            }
        }
    }
}
