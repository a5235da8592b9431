//! # Hass-Link
//!
//! Client for the Home Assistant WebSocket push API: one long-lived
//! connection streaming real-time state-change events to any number of
//! in-process subscribers.
//!
//! ## Features
//!
//! - **Handshake**: hello/auth exchange, including hubs that skip auth
//! - **Concurrent I/O**: one read loop and one write loop per
//!   connection, outbound commands through a single FIFO queue
//! - **Fan-out**: decoded envelopes reach every subscriber through a
//!   topic-keyed event bus
//! - **Independent subscriptions**: each subscription filters by its
//!   own correlation id and can be torn down without touching the
//!   connection
//!
//! ## Modules
//!
//! - [`client`]: connection lifecycle, event bus, and subscriptions
//! - [`config`]: TOML / environment configuration for the binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hass_link::connect;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = connect("localhost", 8123, false, "long-lived-token").await?;
//!
//!     let sub = conn
//!         .subscribe_events("state_changed", |event| {
//!             println!("{}: {:?}", event.data.entity_id, event.data.new_state);
//!         })
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!
//!     sub.unsubscribe().await;
//!     conn.close().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;

// Re-export top-level types for convenience
pub use client::{
    connect, ClientError, ClientMessage, Connection, ConnectionState, ErrorInfo, Event,
    EventBus, EventData, EventSubscription, ServerMessage, StateSnapshot, Transport,
    TransportError, WsTransport,
};

pub use config::{Config, ConfigError, ConnectionConfig, LoggingConfig};
