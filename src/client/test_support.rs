//! Scripted transport for exercising connection logic without a socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use super::messages::{ClientMessage, ServerMessage};
use super::transport::{Transport, TransportError};

/// In-memory [`Transport`] fed by the test: inbound frames arrive
/// through a channel, everything written is recorded for assertions.
pub(crate) struct FakeTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Result<ServerMessage, TransportError>>>,
    writes: Mutex<Vec<ClientMessage>>,
    close_messages: AtomicUsize,
    closes: AtomicUsize,
}

/// Test-side controls for a [`FakeTransport`].
pub(crate) struct FakeTransportHandle {
    transport: Arc<FakeTransport>,
    frames: mpsc::UnboundedSender<Result<ServerMessage, TransportError>>,
}

pub(crate) fn fake_transport() -> FakeTransportHandle {
    let (frames, inbound) = mpsc::unbounded_channel();
    FakeTransportHandle {
        transport: Arc::new(FakeTransport {
            inbound: Mutex::new(inbound),
            writes: Mutex::new(Vec::new()),
            close_messages: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }),
        frames,
    }
}

impl FakeTransportHandle {
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport) as Arc<dyn Transport>
    }

    /// Queue an inbound frame for the connection to read.
    pub fn push(&self, msg: ServerMessage) {
        let _ = self.frames.send(Ok(msg));
    }

    /// Queue an inbound failure, as if the socket died.
    pub fn push_error(&self, error: TransportError) {
        let _ = self.frames.send(Err(error));
    }

    /// Everything the connection wrote so far, in write order.
    pub async fn writes(&self) -> Vec<ClientMessage> {
        self.transport.writes.lock().await.clone()
    }

    /// How many times the close handshake ran.
    pub fn close_message_count(&self) -> usize {
        self.transport.close_messages.load(Ordering::SeqCst)
    }

    /// How many times the socket was released.
    pub fn close_count(&self) -> usize {
        self.transport.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn read_message(&self) -> Result<ServerMessage, TransportError> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(frame) => frame,
            None => Err(TransportError::Closed),
        }
    }

    async fn write_message(&self, msg: &ClientMessage) -> Result<(), TransportError> {
        self.writes.lock().await.push(msg.clone());
        Ok(())
    }

    async fn send_close_message(&self) {
        self.close_messages.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
