//! Asynchronous notification bus backed by tokio broadcast channels.
//!
//! # How delivery works (for beginners)
//!
//! Each topic owns one `tokio::sync::broadcast` channel.  `publish` pushes the
//! payload into the channel and returns immediately.  Each subscription owns
//! a receiver and a spawned task that waits on it and calls the handler for
//! every payload, so handlers run later on the runtime, not inside
//! `publish`.
//!
//! # Lagging subscribers
//!
//! The channel holds at most `capacity` payloads.  A subscriber that falls
//! further behind skips the oldest ones (a warning is logged) and carries on
//! with the newest.  For whole-value configuration updates only the latest
//! payload matters, so skipping is acceptable.
//!
//! # Channel lifetime
//!
//! A topic's channel is created by its first subscriber and removed by the
//! first `publish` that finds no receiver left, so the map only holds
//! topics someone is listening to (or stopped listening to since the last
//! publish).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

use crate::application::bus::{BusHandler, BusSubscription, NotificationBus};

type Channels = HashMap<String, broadcast::Sender<serde_json::Value>>;

/// Per-topic channel capacity.
pub const DEFAULT_CAPACITY: usize = 64;

/// Bus that delivers payloads asynchronously through tokio tasks.
pub struct EventBus {
    runtime: Handle,
    capacity: usize,
    channels: Mutex<Channels>,
}

impl EventBus {
    /// Creates a bus whose delivery tasks run on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self::with_capacity(runtime, DEFAULT_CAPACITY)
    }

    /// Creates a bus with a custom per-topic channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a tokio broadcast requirement).
    pub fn with_capacity(runtime: Handle, capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        Self {
            runtime,
            capacity,
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn lock_channels(&self) -> MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of topics that currently own a channel.
    pub fn topic_count(&self) -> usize {
        self.lock_channels().len()
    }
}

impl NotificationBus for EventBus {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        let mut channels = self.lock_channels();
        let Some(sender) = channels.get(topic) else {
            trace!(topic, "event bus publish with no subscribers");
            return;
        };
        // `send` only fails when every receiver is gone; drop the channel then.
        match sender.send(payload) {
            Ok(receivers) => trace!(topic, receivers, "event bus publish"),
            Err(_) => {
                channels.remove(topic);
                trace!(topic, "event bus publish with no subscribers; channel removed");
            }
        }
    }

    fn subscribe(&self, topic: &str, handler: BusHandler) -> BusSubscription {
        // Subscribed under the map lock so a concurrent publish cannot remove
        // the channel between lookup and subscription.
        let mut rx = self
            .lock_channels()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        let topic = topic.to_string();

        let task = self.runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => handler(payload),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(topic = %topic, skipped, "subscriber lagged; skipping old payloads");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        BusSubscription::new(move || task.abort())
    }
}
