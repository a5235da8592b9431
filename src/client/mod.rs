//! Hub Connection Client
//!
//! Maintains one long-lived WebSocket connection to a Home Assistant
//! hub and distributes its event stream to in-process subscribers.
//!
//! ## Architecture
//!
//! - **Transport**: message-framed socket abstraction over the raw
//!   WebSocket; the only layer that touches the wire
//! - **Connection**: handshake, the read/write loop pair, and the
//!   outbound command queue
//! - **EventBus**: topic-keyed fan-out registry the read loop publishes
//!   every decoded envelope into
//! - **EventSubscription**: per-caller dispatch loop that filters the
//!   shared stream by correlation id and invokes a user callback
//!
//! ## Example
//!
//! ```rust,no_run
//! use hass_link::client::connect;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = connect("localhost", 8123, false, "long-lived-token").await?;
//! let sub = conn
//!     .subscribe_events("state_changed", |event| {
//!         println!("{} changed", event.data.entity_id);
//!     })
//!     .await?;
//!
//! // ... later
//! sub.unsubscribe().await;
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

mod bus;
mod connection;
mod messages;
mod subscription;
mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use bus::{EventBus, SubscriberId};
pub use connection::{connect, ClientError, Connection, ConnectionState};
pub use messages::{
    ClientMessage, ErrorInfo, Event, EventData, ServerMessage, StateSnapshot,
};
pub use subscription::{EventSubscription, OnEvent};
pub use transport::{Transport, TransportError, WsTransport};
