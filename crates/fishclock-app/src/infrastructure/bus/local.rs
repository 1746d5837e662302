//! Synchronous in-process notification bus.
//!
//! `publish` calls every handler subscribed to the topic, in subscription
//! order, before returning.  The publisher's own handlers are included.
//! No lock is held while handlers run, so a handler may publish, subscribe,
//! or drop its own subscription.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::trace;

use crate::application::bus::{BusHandler, BusSubscription, NotificationBus};

#[derive(Default)]
struct Topics {
    next_id: u64,
    handlers: HashMap<String, Vec<(u64, BusHandler)>>,
}

/// Bus that delivers every payload immediately on the publishing thread.
#[derive(Default)]
pub struct LocalBus {
    topics: Arc<Mutex<Topics>>,
}

fn lock(topics: &Mutex<Topics>) -> MutexGuard<'_, Topics> {
    topics.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        lock(&self.topics).handlers.get(topic).map_or(0, Vec::len)
    }
}

impl NotificationBus for LocalBus {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        let handlers: Vec<BusHandler> = lock(&self.topics)
            .handlers
            .get(topic)
            .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        trace!(topic, subscribers = handlers.len(), "local bus publish");
        for handler in handlers {
            handler(payload.clone());
        }
    }

    fn subscribe(&self, topic: &str, handler: BusHandler) -> BusSubscription {
        let id = {
            let mut topics = lock(&self.topics);
            let id = topics.next_id;
            topics.next_id += 1;
            topics
                .handlers
                .entry(topic.to_string())
                .or_default()
                .push((id, handler));
            id
        };

        let weak: Weak<Mutex<Topics>> = Arc::downgrade(&self.topics);
        let topic = topic.to_string();
        BusSubscription::new(move || {
            if let Some(topics) = weak.upgrade() {
                let mut topics = lock(&topics);
                if let Some(subs) = topics.handlers.get_mut(&topic) {
                    subs.retain(|(sid, _)| *sid != id);
                    if subs.is_empty() {
                        topics.handlers.remove(&topic);
                    }
                }
            }
        })
    }
}
