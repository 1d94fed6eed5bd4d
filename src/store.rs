//! Live view of probe results.
//!
//! The store keeps the latest result per URL and a short history, and pushes a
//! fresh snapshot to every subscriber after each change. State is guarded by a
//! single [`RwLock`]; fan-out happens after that lock is released so a stuck
//! subscriber never blocks readers or writers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use crate::models::{CheckResult, Envelope, HistoryEntry, HistorySnapshot, ResultsSnapshot};

pub const HISTORY_LIMIT: usize = 10;

/// Envelopes a subscriber may have queued before it is considered stuck.
pub const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// A registered feed, as handed out by [`Store::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Envelope>,
}

#[derive(Default)]
struct StoreState {
    results: ResultsSnapshot,
    history: HistorySnapshot,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Envelope>>,
}

#[derive(Default)]
pub struct Store {
    state: RwLock<StoreState>,
    // Held across mutate + fan-out so subscribers see envelopes in mutation order.
    publish: Mutex<()>,
    next_id: AtomicU64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `result` as the latest for its URL and appends a history entry.
    pub async fn update_result(&self, result: CheckResult) {
        let entry = HistoryEntry::from(&result);
        {
            let _publish = self.publish.lock().await;
            let (snapshot, subscribers) = {
                let mut state = self.state.write().await;
                state.results.insert(result.url.clone(), result);
                (Arc::new(state.results.clone()), Self::senders(&state))
            };
            self.fan_out(Envelope::Results(snapshot), subscribers).await;
        }
        self.add_history(entry).await;
    }

    /// Prepends `entry`, keeping at most [`HISTORY_LIMIT`] entries.
    pub async fn add_history(&self, entry: HistoryEntry) {
        let _publish = self.publish.lock().await;
        let (snapshot, subscribers) = {
            let mut state = self.state.write().await;
            state.history.insert(0, entry);
            state.history.truncate(HISTORY_LIMIT);
            (Arc::new(state.history.clone()), Self::senders(&state))
        };
        self.fan_out(Envelope::History(snapshot), subscribers).await;
    }

    pub async fn get_results(&self) -> ResultsSnapshot {
        self.state.read().await.results.clone()
    }

    /// Newest first.
    pub async fn get_history(&self) -> HistorySnapshot {
        self.state.read().await.history.clone()
    }

    pub async fn add_subscriber(&self, sender: mpsc::Sender<Envelope>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.state.write().await.subscribers.insert(id, sender);
        debug!(subscriber = id.0, "Subscriber registered");
        id
    }

    /// Creates a bounded feed and registers it.
    pub async fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.add_subscriber(sender).await;
        Subscription { id, receiver }
    }

    pub async fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let removed = self.state.write().await.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = id.0, "Subscriber removed");
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.subscribers.len()
    }

    fn senders(state: &StoreState) -> Vec<(SubscriberId, mpsc::Sender<Envelope>)> {
        state
            .subscribers
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect()
    }

    async fn fan_out(
        &self,
        envelope: Envelope,
        subscribers: Vec<(SubscriberId, mpsc::Sender<Envelope>)>,
    ) {
        let mut failed = Vec::new();
        for (id, sender) in subscribers {
            if let Err(e) = sender.try_send(envelope.clone()) {
                debug!(subscriber = id.0, kind = envelope.kind(), error = %e, "Dropping subscriber");
                failed.push(id);
            }
        }

        if failed.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        for id in failed {
            state.subscribers.remove(&id);
        }
    }
}
