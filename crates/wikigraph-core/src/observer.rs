//! Index event subscriptions

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::index::LinkIndex;
use crate::model::IndexEvent;

/// Receives every event the index emits, synchronously, after the mutation is applied.
///
/// The index is passed in already consistent, so observers may derive views
/// from it without taking any lock of their own.
pub trait IndexObserver: Send + Sync {
    fn on_event(&self, event: &IndexEvent, index: &LinkIndex);
}

impl<F> IndexObserver for F
where
    F: Fn(&IndexEvent, &LinkIndex) + Send + Sync,
{
    fn on_event(&self, event: &IndexEvent, index: &LinkIndex) {
        self(event, index)
    }
}

/// Handle returned by `LinkIndex::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: u64,
    entries: Vec<(SubscriptionId, Arc<dyn IndexObserver>)>,
}

impl ObserverList {
    pub(crate) fn add(&mut self, observer: Arc<dyn IndexObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn notify(&self, event: &IndexEvent, index: &LinkIndex) {
        for (_, observer) in &self.entries {
            observer.on_event(event, index);
        }
    }
}

/// Forwards events into a broadcast channel for async consumers.
pub struct ChannelObserver {
    tx: broadcast::Sender<IndexEvent>,
}

impl ChannelObserver {
    pub fn new(tx: broadcast::Sender<IndexEvent>) -> Self {
        Self { tx }
    }
}

impl IndexObserver for ChannelObserver {
    fn on_event(&self, event: &IndexEvent, _index: &LinkIndex) {
        // No receivers is fine; lagging ones see RecvError::Lagged.
        let _ = self.tx.send(event.clone());
    }
}
