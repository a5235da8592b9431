//! Connection Lifecycle
//!
//! Dials the hub, runs the authentication handshake, then drives one
//! read loop and one write loop until the connection closes. Decoded
//! envelopes fan out to subscriptions through the event bus; outbound
//! commands funnel through a single bounded queue.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::bus::EventBus;
use super::messages::{ClientMessage, Event, ServerMessage};
use super::subscription::EventSubscription;
use super::transport::{Transport, TransportError, WsTransport};

/// Topic every inbound envelope is published under.
const EVENTS_TOPIC: &str = "events";

/// Depth of the outbound command queue. Enqueueing suspends once this
/// many commands are waiting for the write loop.
const OUTBOUND_QUEUE_DEPTH: usize = 20;

/// WebSocket endpoint path exposed by the hub.
const ENDPOINT_PATH: &str = "/api/websocket";

/// Lifecycle states of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authorizing,
    Connected,
    Closing,
    Closed,
}

/// Errors surfaced while establishing or using a connection.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("failed to reach the hub: {0}")]
    Dial(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("hub rejected authentication: {0}")]
    Auth(String),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("connection is closed")]
    ConnectionClosed,
}

/// Connect to a hub and return a live connection handle.
///
/// Dial failures and handshake rejections are returned synchronously;
/// no background tasks exist until this succeeds.
pub async fn connect(
    host: &str,
    port: u16,
    tls: bool,
    token: &str,
) -> Result<Connection, ClientError> {
    let scheme = if tls { "wss" } else { "ws" };
    let endpoint = Url::parse(&format!("{scheme}://{host}:{port}{ENDPOINT_PATH}"))?;

    tracing::debug!(endpoint = %endpoint, "Dialing hub");
    let (stream, _) = connect_async(endpoint.as_str())
        .await
        .map_err(ClientError::Dial)?;

    Connection::establish(Arc::new(WsTransport::new(stream)), token).await
}

/// Handle to a live hub connection. Cheap to clone; all clones share
/// the same underlying connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

struct ConnectionInner {
    state: RwLock<ConnectionState>,
    /// Message id counter; incremented before each outbound command, so
    /// the first command goes out with id 1.
    next_msg_id: AtomicI64,
    /// Guards the close sequence so it runs at most once.
    close_lock: Mutex<()>,
    /// Cancelling stops the read and write loops. Subscriptions carry
    /// their own tokens and are not covered.
    cancel: CancellationToken,
    transport: Arc<dyn Transport>,
    bus: Arc<EventBus<ServerMessage>>,
    outbound: mpsc::Sender<ClientMessage>,
}

impl Connection {
    /// Run the handshake over an established transport, then start the
    /// read and write loops.
    pub(crate) async fn establish(
        transport: Arc<dyn Transport>,
        token: &str,
    ) -> Result<Self, ClientError> {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);

        let inner = Arc::new(ConnectionInner {
            state: RwLock::new(ConnectionState::Authorizing),
            next_msg_id: AtomicI64::new(0),
            close_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
            transport,
            bus: Arc::new(EventBus::new()),
            outbound: outbound_tx,
        });

        if let Err(e) = inner.authorize(token).await {
            *inner.state.write().await = ConnectionState::Closed;
            inner.transport.close().await;
            return Err(e);
        }

        *inner.state.write().await = ConnectionState::Connected;

        tokio::spawn(read_loop(Arc::clone(&inner)));
        tokio::spawn(write_loop(Arc::clone(&inner), outbound_rx));

        Ok(Self { inner })
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    /// Whether the connection is up and delivering events.
    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Queue a command for the hub. All producers share one bounded
    /// queue drained in FIFO order by the write loop; a full queue
    /// suspends the caller until space frees.
    pub async fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        self.inner
            .outbound
            .send(msg)
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Subscribe to hub events of one type (`"*"` for all).
    ///
    /// The subscription is active as soon as this returns; the hub's
    /// acknowledgment of the subscribe command is not awaited. The
    /// callback runs on a fresh task per matching event.
    pub async fn subscribe_events<F>(
        &self,
        event_type: &str,
        callback: F,
    ) -> Result<EventSubscription, ClientError>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let id = self.inner.next_msg_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (subscriber_id, rx) = self.inner.bus.subscribe(EVENTS_TOPIC).await;

        let command = ClientMessage::SubscribeEvents {
            id,
            event_type: event_type.to_string(),
        };
        if let Err(e) = self.send(command).await {
            // Never got on the wire; withdraw the channel again.
            self.inner.bus.unsubscribe(EVENTS_TOPIC, subscriber_id).await;
            return Err(e);
        }

        tracing::debug!(id, event_type, "Subscribed to events");
        Ok(EventSubscription::spawn(
            id,
            EVENTS_TOPIC,
            subscriber_id,
            rx,
            Arc::clone(&self.inner.bus),
            Arc::new(callback),
        ))
    }

    /// Shut the connection down: stop both loops, run the close
    /// handshake, release the socket. Idempotent; concurrent callers
    /// beyond the first return immediately without blocking.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

impl ConnectionInner {
    /// Hello/auth exchange. The hub either opens with `auth_required`
    /// or is happy to talk right away.
    async fn authorize(&self, token: &str) -> Result<(), ClientError> {
        let hello = self.transport.read_message().await?;

        match hello {
            ServerMessage::AuthRequired { ha_version } => {
                tracing::info!(%ha_version, "Connected to hub, authenticating");
            }
            // Anything else means no auth is needed; the frame itself
            // carries nothing a subscription could want yet.
            _ => {
                tracing::info!("Connected to hub, no authentication required");
                return Ok(());
            }
        }

        self.transport
            .write_message(&ClientMessage::Auth {
                access_token: token.to_string(),
            })
            .await?;

        match self.transport.read_message().await? {
            ServerMessage::AuthOk => {
                tracing::info!("Authentication accepted");
                Ok(())
            }
            ServerMessage::AuthInvalid { error } => {
                let message = error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "authentication rejected".to_string());
                tracing::error!(error = %message, "Authentication rejected");
                Err(ClientError::Auth(message))
            }
            other => Err(ClientError::Auth(format!(
                "unexpected reply to auth: {other:?}"
            ))),
        }
    }

    async fn is_shutting_down(&self) -> bool {
        matches!(
            *self.state.read().await,
            ConnectionState::Closing | ConnectionState::Closed
        )
    }

    /// Tear the connection down. Only one caller ever runs the
    /// sequence: losers of a concurrent race, and any call after the
    /// connection already went down, are immediate no-ops.
    async fn close(&self) {
        let Ok(_guard) = self.close_lock.try_lock() else {
            return;
        };
        if self.is_shutting_down().await {
            return;
        }
        *self.state.write().await = ConnectionState::Closing;

        self.cancel.cancel();
        self.transport.send_close_message().await;
        self.transport.close().await;

        *self.state.write().await = ConnectionState::Closed;
        tracing::info!("Connection closed");
    }
}

/// Drain inbound frames and fan them out until cancelled or the
/// transport dies.
async fn read_loop(inner: Arc<ConnectionInner>) {
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => return,
            received = inner.transport.read_message() => match received {
                // Hub-reported command failure: transient, the
                // connection stays up.
                Ok(ServerMessage::Result { id, error: Some(error), .. }) => {
                    tracing::warn!(id, code = %error.code, "Hub reported an error: {}", error.message);
                }
                Ok(msg) => inner.bus.publish(EVENTS_TOPIC, msg).await,
                Err(e) => {
                    // A failure we caused by closing is expected noise;
                    // anything else takes the connection down.
                    if !inner.is_shutting_down().await {
                        tracing::error!(error = %e, "Connection lost, shutting down");
                        inner.close().await;
                    }
                    return;
                }
            },
        }
    }
}

/// Forward queued commands to the transport until cancelled.
async fn write_loop(inner: Arc<ConnectionInner>, mut outbound: mpsc::Receiver<ClientMessage>) {
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => return,
            queued = outbound.recv() => match queued {
                Some(msg) => {
                    // No caller is waiting on this result; a dead
                    // transport surfaces through the read loop.
                    if let Err(e) = inner.transport.write_message(&msg).await {
                        tracing::warn!(error = %e, "Failed to write outbound message");
                    }
                }
                None => return,
            },
        }
    }
}
