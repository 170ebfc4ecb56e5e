//! Event bus contract
//!
//! The bus is the host substrate's signaling channel: at-least-once,
//! ordered per sender, not globally ordered. It stamps every broadcast with
//! the sender id and the session time at which it was sent.

mod memory;
mod message;

pub use memory::{MemoryBus, MemoryHub, DEFAULT_SENT_HISTORY};
pub use message::{Envelope, SessionMessage, TransportAction};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BusError;
use crate::subscription::Subscription;

/// What a bus subscriber receives
#[derive(Debug, Clone, PartialEq)]
pub enum BusNotice {
    Message(Envelope),
    /// The local connection was lost
    Disconnected,
    /// The local connection was restored
    Reconnected,
    /// The underlying session was reset; shared state is gone
    Reset,
}

/// Broadcast channel to every other member of the session
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Whether the local client has joined the session
    fn is_connected(&self) -> bool;

    /// Send `message` to every other member
    ///
    /// Resolves once the substrate has accepted the message.
    async fn broadcast(&self, message: SessionMessage) -> Result<(), BusError>;

    /// Start receiving notices
    fn subscribe(&self) -> BusSubscription;
}

/// Receiving side of a bus subscription
///
/// Dropping it, or calling [`BusSubscription::unsubscribe`], detaches from
/// the bus.
#[derive(Debug)]
pub struct BusSubscription {
    rx: mpsc::UnboundedReceiver<BusNotice>,
    _handle: Subscription,
}

impl BusSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<BusNotice>, handle: Subscription) -> Self {
        Self {
            rx,
            _handle: handle,
        }
    }

    /// Next queued notice, if any
    pub fn try_recv(&mut self) -> Option<BusNotice> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next notice; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<BusNotice> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}
