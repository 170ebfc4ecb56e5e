//! In-process event bus
//!
//! Connects any number of clients in one process. Every delivery goes
//! through the JSON codec so that simulations exercise the same encoding a
//! networked bus would.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use livesync_state::ClientId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::{BusNotice, BusSubscription, Envelope, EventBus, SessionMessage};
use crate::clock::Clock;
use crate::error::BusError;
use crate::subscription::Subscription;

#[derive(Default)]
struct Member {
    connected: bool,
    subscribers: HashMap<u64, mpsc::UnboundedSender<BusNotice>>,
}

impl Member {
    fn send(&self, notice: &BusNotice) {
        for tx in self.subscribers.values() {
            // A closed receiver is cleaned up when its handle drops
            let _ = tx.send(notice.clone());
        }
    }
}

/// Envelopes kept by [`MemoryHub::sent`] unless configured otherwise
pub const DEFAULT_SENT_HISTORY: usize = 1024;

struct HubInner {
    clock: Arc<dyn Clock>,
    members: Mutex<HashMap<ClientId, Member>>,
    sent: Mutex<VecDeque<Envelope>>,
    sent_capacity: usize,
    next_subscriber: AtomicU64,
}

/// Shared medium for a set of [`MemoryBus`] connections
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    /// Create a hub that stamps envelopes with `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_history(clock, DEFAULT_SENT_HISTORY)
    }

    /// Create a hub that remembers the last `capacity` broadcasts
    ///
    /// A capacity of 0 disables recording.
    pub fn with_history(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                clock,
                members: Mutex::new(HashMap::new()),
                sent: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_SENT_HISTORY))),
                sent_capacity: capacity,
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    /// Join the session as `client_id`
    pub fn connect(&self, client_id: impl Into<ClientId>) -> MemoryBus {
        let client_id = client_id.into();
        self.inner
            .members
            .lock()
            .entry(client_id.clone())
            .or_default()
            .connected = true;
        debug!(client = %client_id, "Client connected to memory hub");

        MemoryBus {
            hub: Arc::clone(&self.inner),
            client_id,
        }
    }

    /// Toggle a member's connectivity
    ///
    /// Disconnected members cannot broadcast and miss messages sent in the
    /// meantime.
    pub fn set_connected(&self, client_id: &ClientId, connected: bool) {
        let mut members = self.inner.members.lock();
        let member = members.entry(client_id.clone()).or_default();
        if member.connected == connected {
            return;
        }
        member.connected = connected;
        let notice = if connected {
            BusNotice::Reconnected
        } else {
            BusNotice::Disconnected
        };
        debug!(client = %client_id, connected, "Memory hub connectivity changed");
        member.send(&notice);
    }

    /// Simulate a reset of the underlying session
    pub fn reset_session(&self) {
        warn!("Memory hub session reset");
        for member in self.inner.members.lock().values() {
            member.send(&BusNotice::Reset);
        }
    }

    /// Deliver `envelope` to one member again
    ///
    /// Used to simulate at-least-once duplicates and delayed delivery.
    pub fn deliver(&self, to: &ClientId, envelope: &Envelope) -> Result<(), BusError> {
        let decoded = Envelope::from_json(&envelope.to_json()?)?;
        match self.inner.members.lock().get(to) {
            Some(member) => {
                member.send(&BusNotice::Message(decoded));
                Ok(())
            }
            None => Err(BusError::Closed),
        }
    }

    /// Recent envelopes broadcast through the hub, oldest first
    pub fn sent(&self) -> Vec<Envelope> {
        self.inner.sent.lock().iter().cloned().collect()
    }
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHub")
            .field("members", &self.inner.members.lock().len())
            .finish()
    }
}

/// One client's connection to a [`MemoryHub`]
pub struct MemoryBus {
    hub: Arc<HubInner>,
    client_id: ClientId,
}

impl MemoryBus {
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    fn is_connected(&self) -> bool {
        self.hub
            .members
            .lock()
            .get(&self.client_id)
            .map(|m| m.connected)
            .unwrap_or(false)
    }

    async fn broadcast(&self, message: SessionMessage) -> Result<(), BusError> {
        let envelope = Envelope::new(self.client_id.clone(), self.hub.clock.now(), message);
        let json = envelope.to_json()?;

        {
            let members = self.hub.members.lock();
            match members.get(&self.client_id) {
                Some(member) if member.connected => {}
                _ => return Err(BusError::Disconnected),
            }

            for (id, member) in members.iter() {
                if *id == self.client_id || !member.connected {
                    continue;
                }
                let decoded = Envelope::from_json(&json)?;
                member.send(&BusNotice::Message(decoded));
            }
        }

        trace!(
            sender = %self.client_id,
            kind = envelope.message.kind(),
            timestamp = %envelope.timestamp,
            "Broadcast on memory hub"
        );
        if self.hub.sent_capacity > 0 {
            let mut sent = self.hub.sent.lock();
            if sent.len() == self.hub.sent_capacity {
                sent.pop_front();
            }
            sent.push_back(envelope);
        }
        Ok(())
    }

    fn subscribe(&self) -> BusSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.hub.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.hub
            .members
            .lock()
            .entry(self.client_id.clone())
            .or_default()
            .subscribers
            .insert(id, tx);

        let hub: Weak<HubInner> = Arc::downgrade(&self.hub);
        let client_id = self.client_id.clone();
        let handle = Subscription::new(move || {
            if let Some(hub) = hub.upgrade() {
                if let Some(member) = hub.members.lock().get_mut(&client_id) {
                    member.subscribers.remove(&id);
                }
            }
        });
        BusSubscription::new(rx, handle)
    }
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("client_id", &self.client_id)
            .finish()
    }
}
