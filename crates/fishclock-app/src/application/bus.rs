//! NotificationBus: process-wide publish/subscribe between windows.
//!
//! The bus is addressed by topic name and carries JSON payloads, because
//! windows do not share memory.  Delivery guarantees belong to the
//! implementation: callers must tolerate duplicates, self-delivery, and
//! arbitrary ordering between publishers.

use std::fmt;
use std::sync::Arc;

/// Callback invoked with each payload published on a subscribed topic.
pub type BusHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Topic-based publish/subscribe transport shared by every window.
pub trait NotificationBus: Send + Sync {
    /// Publishes `payload` to every current subscriber of `topic`.
    ///
    /// Never blocks waiting for subscribers.  Publishing to a topic with no
    /// subscribers is not an error.
    fn publish(&self, topic: &str, payload: serde_json::Value);

    /// Registers `handler` for every later payload on `topic`.
    ///
    /// Delivery stops when the returned [`BusSubscription`] is cancelled or
    /// dropped.
    fn subscribe(&self, topic: &str, handler: BusHandler) -> BusSubscription;
}

/// Handle to a live bus subscription.  Dropping it unsubscribes.
pub struct BusSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl BusSubscription {
    /// Wraps the implementation-specific teardown for one subscription.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stops delivery to this subscription's handler.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for BusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
