//! WebSocket Transport
//!
//! Owns the raw socket and frames protocol messages over it. The trait
//! seam exists so connection logic can run against a scripted transport
//! in tests; the real implementation wraps a tokio-tungstenite stream.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::messages::{ClientMessage, ServerMessage};

/// How long to wait for the peer to answer our close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport-level failures. No retries happen at this layer; every
/// failure is reported to the caller.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("connection closed by peer")]
    Closed,
}

/// Bidirectional message-framed socket.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Block until the next protocol message arrives.
    async fn read_message(&self) -> Result<ServerMessage, TransportError>;

    /// Serialize and send a single protocol message.
    async fn write_message(&self, msg: &ClientMessage) -> Result<(), TransportError>;

    /// Graceful shutdown handshake: send a close frame, then wait
    /// briefly for the peer's acknowledgment, discarding whatever
    /// arrives. Returns once the peer answered or the wait expired.
    async fn send_close_message(&self);

    /// Release the underlying socket.
    async fn close(&self);
}

/// Transport over a tokio-tungstenite stream.
///
/// The read and write halves are locked independently so the read loop
/// can sit in `read_message` without starving writers.
pub struct WsTransport {
    reader: Mutex<SplitStream<WsStream>>,
    writer: Mutex<SplitSink<WsStream, Message>>,
}

impl WsTransport {
    pub fn new(stream: WsStream) -> Self {
        let (writer, reader) = stream.split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn read_message(&self) -> Result<ServerMessage, TransportError> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text).map_err(TransportError::from);
                }
                Some(Ok(Message::Binary(data))) => {
                    return serde_json::from_slice(&data).map_err(TransportError::from);
                }
                // Pings are answered by tungstenite itself; pongs and
                // raw frames carry nothing for us.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn write_message(&self, msg: &ClientMessage) -> Result<(), TransportError> {
        let text = serde_json::to_string(msg)?;
        let mut writer = self.writer.lock().await;
        writer.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn send_close_message(&self) {
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.send(Message::Close(None)).await {
                tracing::debug!(error = %e, "Failed to send close frame");
                return;
            }
        }
        // The read loop has stopped by the time we get here, so the
        // reader half is free. Whatever the peer sends back is
        // discarded.
        let mut reader = self.reader.lock().await;
        let _ = tokio::time::timeout(CLOSE_GRACE, reader.next()).await;
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            tracing::debug!(error = %e, "Error releasing websocket");
        }
    }
}
