//! Wire Protocol Messages
//!
//! Defines the JSON message shapes exchanged with a Home Assistant hub
//! over the WebSocket API. Every frame carries a `type` discriminator,
//! so both directions are modelled as internally-tagged enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Messages sent from client to hub
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Answer to an `auth_required` hello
    Auth {
        /// Long-lived access token issued by the hub
        access_token: String,
    },
    /// Ask the hub to start streaming events
    SubscribeEvents {
        /// Correlation id; the hub echoes it on every matching event
        id: i64,
        /// Event type to stream, or `"*"` for all events
        event_type: String,
    },
}

/// Messages received from the hub
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Hello from a hub that wants credentials before anything else
    AuthRequired {
        #[serde(default)]
        ha_version: String,
    },
    /// Authentication accepted
    AuthOk,
    /// Authentication rejected
    AuthInvalid {
        #[serde(default)]
        error: Option<ErrorInfo>,
    },
    /// A subscribed event fired
    Event {
        /// Correlation id of the subscribe command that produced this
        id: i64,
        event: Event,
    },
    /// Outcome of a command
    Result {
        id: i64,
        #[serde(default)]
        success: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<ErrorInfo>,
    },
}

/// Hub-reported error detail
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorInfo {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// An event fired by the hub
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    /// Event type, e.g. `state_changed` or `call_service`
    pub event_type: String,
    /// When the hub fired the event
    pub time_fired: DateTime<Utc>,
    #[serde(default)]
    pub data: EventData,
}

/// Payload of an event; which fields are populated depends on the
/// event type (state changes carry states, service calls carry
/// domain/service).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub new_state: Option<StateSnapshot>,
    #[serde(default)]
    pub old_state: Option<StateSnapshot>,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub service_data: HashMap<String, Value>,
}

/// State of one entity at a point in time
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// Entity state; the hub sends strings for most entities but
    /// numbers and objects exist, so this stays polymorphic
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}
