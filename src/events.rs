//! # Events Module
//!
//! Push-based fan-out of modem and call events to every subscriber.
//!
//! Delivery is fire-and-forget over a `tokio::sync::broadcast` channel: the
//! sender never waits, and a subscriber that falls behind loses the oldest
//! events (it sees `RecvError::Lagged`) instead of slowing the modem down.

use log::debug;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::modem::ModemStatus;

/// Status shown to subscribers right after a dial command is accepted.
pub const DIALING: &str = "Dialing...";

/// An event published to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialerEvent {
    /// The modem status changed or was re-announced.
    ModemStatus(ModemStatus),
    /// Progress of an outbound call.
    CallStatus { to: String, status: String },
    /// A call was hung up.
    CallEnded { to: String },
}

impl DialerEvent {
    /// Name of the event on the real-time channel.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            DialerEvent::ModemStatus(_) => "modemStatus",
            DialerEvent::CallStatus { .. } => "callStatus",
            DialerEvent::CallEnded { .. } => "callEnded",
        }
    }

    /// JSON payload of the event.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            DialerEvent::ModemStatus(status) => json!({
                "connected": status.connected,
                "ready": status.ready,
            }),
            DialerEvent::CallStatus { to, status } => json!({ "to": to, "status": status }),
            DialerEvent::CallEnded { to } => json!({ "to": to }),
        }
    }
}

/// Cloneable handle publishing [`DialerEvent`]s.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    tx: broadcast::Sender<DialerEvent>,
}

impl Broadcaster {
    /// Each subscriber may fall at most `capacity` events behind.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Broadcaster { tx }
    }

    /// A receiver for every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DialerEvent> {
        self.tx.subscribe()
    }

    /// Publishes `event`, returning how many subscribers it reached.
    pub fn emit(&self, event: DialerEvent) -> usize {
        let name = event.event_name();
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("No subscribers for {name}");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
