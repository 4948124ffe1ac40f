//! Subscriber registry.
//!
//! Tracks the live set of subscriber queues. `add`, `remove` and
//! `for_each_open` are mutually atomic: iteration holds the read lock and
//! removal takes the write lock, so once `remove` has returned the removed
//! queue is never handed to a fan-out again.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Relayed message body; shared between all subscriber queues.
pub type Payload = Arc<str>;

/// Identifier assigned to a subscriber on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Live subscriber set. Owned by `BroadcastHub`; only the hub mutates it.
#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Payload>>>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register an outbound queue.
    pub(crate) fn add(&self, queue: mpsc::Sender<Payload>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().insert(id, queue);
        id
    }

    /// Unregister a subscriber. Returns `false` if it was not registered.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        self.subscribers.write().remove(&id).is_some()
    }

    /// Call `f` for every registered queue whose receiver is still alive.
    ///
    /// `f` must not block and must not call back into the registry.
    pub fn for_each_open<F>(&self, mut f: F)
    where
        F: FnMut(SubscriberId, &mpsc::Sender<Payload>),
    {
        let subscribers = self.subscribers.read();
        for (id, queue) in subscribers.iter() {
            if !queue.is_closed() {
                f(*id, queue);
            }
        }
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}
