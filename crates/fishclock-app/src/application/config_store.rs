//! ConfigStore: one window's replica of the shared configuration.
//!
//! Every window owns exactly one store.  The store holds the last-known
//! configuration value (or `None` before anything has been loaded or
//! received), an ordered list of subscriber callbacks, and the two
//! collaborators it talks to:
//!
//! ```text
//!            load() / save()                 broadcast()
//! ConfigStore ──────────────> Persistence    ──────────────> Notification
//!      ▲                      Gateway                        Bus
//!      └──────────────────────── set(notification.config) ◄──┘
//! ```
//!
//! # Consistency model
//!
//! Windows converge by whole-value replacement.  Every inbound notification
//! overwrites the cached value unconditionally, so the last notification to
//! arrive wins and duplicates are harmless.  Nothing orders a `save()` against
//! a peer's receipt of the matching `broadcast()`; the two are independent
//! calls that the UI sequences itself (see
//! [`commit_settings`](crate::application::commit_settings::commit_settings)).
//!
//! # Subscribers
//!
//! Callbacks run in registration order, once per change, in the order the
//! changes were made.  Deliveries for one store are serialized: a change made
//! while another thread (or a callback of this store) is delivering is queued
//! and delivered by that thread once the current round finishes, so every
//! subscriber ends on the cached value.  With no delivery in progress, `set`
//! runs the callbacks before it returns.
//!
//! The internal lock is released before any callback runs, so a callback may
//! read or change the store without deadlocking.
//!
//! # Errors
//!
//! The store never retries and never logs `load`/`save` failures: they are
//! returned to the caller and the cached value is left as it was.  Passive
//! subscribers only ever see values, never errors.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use fishclock_core::{
    decode_notification, encode_notification, ChangeNotification, NotificationError, WindowId,
    CONFIG_UPDATE_TOPIC,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::bus::{BusHandler, BusSubscription, NotificationBus};
use crate::application::gateway::{GatewayError, PersistenceGateway};

/// Error type for store operations that reach a collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persistence gateway rejected `load` or `save`.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The value passed to `broadcast` could not be encoded.
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

/// Subscriber callback.  Receives `None` while nothing has been loaded.
pub type Subscriber<C> = dyn Fn(Option<&C>) + Send + Sync;

/// One value to hand to the subscribers registered when it was queued.
struct Delivery<C> {
    value: Option<C>,
    targets: Vec<Arc<Subscriber<C>>>,
}

struct StoreState<C> {
    value: Option<C>,
    subscribers: Vec<(u64, Arc<Subscriber<C>>)>,
    next_subscriber_id: u64,
    pending: VecDeque<Delivery<C>>,
    /// True while some thread is draining `pending`.
    delivering: bool,
}

struct StoreInner<C> {
    window_id: WindowId,
    state: Mutex<StoreState<C>>,
    gateway: Arc<dyn PersistenceGateway<C>>,
    bus: Arc<dyn NotificationBus>,
    /// Held for the store's lifetime; dropping it leaves the bus topic.
    bus_subscription: Mutex<Option<BusSubscription>>,
}

impl<C> StoreInner<C> {
    fn lock_state(&self) -> MutexGuard<'_, StoreState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs queued deliveries unless another caller already is.
    ///
    /// Takes the guard of the enqueueing call so that enqueueing and the
    /// `delivering` check happen under one lock.
    fn drain<'a>(&'a self, mut state: MutexGuard<'a, StoreState<C>>) {
        if state.delivering {
            return;
        }
        state.delivering = true;
        let _reset = ResetOnPanic(self);

        loop {
            let Some(delivery) = state.pending.pop_front() else {
                state.delivering = false;
                return;
            };
            drop(state);
            for callback in &delivery.targets {
                callback(delivery.value.as_ref());
            }
            state = self.lock_state();
        }
    }
}

/// Releases the delivery role if a callback panics mid-drain.
struct ResetOnPanic<'a, C>(&'a StoreInner<C>);

impl<C> Drop for ResetOnPanic<'_, C> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock_state().delivering = false;
        }
    }
}

/// Per-window replica of the configuration.
///
/// Cloning a `ConfigStore` yields another handle to the same replica, which
/// lets async tasks of the same window share it.  The replica (and its bus
/// subscription) is discarded when the last handle is dropped.
pub struct ConfigStore<C> {
    inner: Arc<StoreInner<C>>,
}

impl<C> Clone for ConfigStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> ConfigStore<C>
where
    C: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates an empty store for `window_id` and subscribes it to the
    /// configuration topic on `bus`.
    ///
    /// From this point on every notification delivered by the bus replaces
    /// the cached value.
    pub fn new(
        window_id: WindowId,
        gateway: Arc<dyn PersistenceGateway<C>>,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        let inner = Arc::new(StoreInner {
            window_id,
            state: Mutex::new(StoreState {
                value: None,
                subscribers: Vec::new(),
                next_subscriber_id: 0,
                pending: VecDeque::new(),
                delivering: false,
            }),
            gateway,
            bus,
            bus_subscription: Mutex::new(None),
        });

        // The handler only holds a weak reference: the bus must not keep a
        // closed window's replica alive.
        let weak = Arc::downgrade(&inner);
        let handler: BusHandler = Arc::new(move |payload: serde_json::Value| {
            if let Some(inner) = weak.upgrade() {
                ConfigStore { inner }.apply_notification(payload);
            }
        });
        let subscription = inner.bus.subscribe(CONFIG_UPDATE_TOPIC, handler);
        *inner
            .bus_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        Self { inner }
    }

    /// The window this replica belongs to.
    pub fn window_id(&self) -> WindowId {
        self.inner.window_id
    }

    /// Returns a copy of the cached value, `None` if not yet loaded.
    pub fn get(&self) -> Option<C> {
        self.inner.lock_state().value.clone()
    }

    /// Registers `callback`, invokes it immediately with the current value,
    /// and again after every later change.
    ///
    /// If a delivery is already running (on another thread, or this call
    /// comes from a callback), the replay is queued behind it.
    ///
    /// Dropping the returned handle does **not** unsubscribe; call
    /// [`Subscription::unsubscribe`] to stop receiving values.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&C>) + Send + Sync + 'static,
    {
        let callback: Arc<Subscriber<C>> = Arc::new(callback);
        let mut state = self.inner.lock_state();
        let id = state.next_subscriber_id;
        state.next_subscriber_id += 1;
        state.subscribers.push((id, Arc::clone(&callback)));
        let replay = Delivery {
            value: state.value.clone(),
            targets: vec![callback],
        };
        state.pending.push_back(replay);
        self.inner.drain(state);

        let weak: Weak<StoreInner<C>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock_state().subscribers.retain(|(sid, _)| *sid != id);
            }
        })
    }

    /// Overwrites the cached value and notifies every subscriber.
    ///
    /// Purely local: nothing is persisted and nothing is published.
    pub fn set(&self, value: C) {
        let mut state = self.inner.lock_state();
        state.value = Some(value.clone());
        let targets = state
            .subscribers
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        state.pending.push_back(Delivery {
            value: Some(value),
            targets,
        });
        self.inner.drain(state);
    }

    /// Replaces the cached value with `updater(current)` and returns it.
    ///
    /// `updater` receives a copy of the current value (`None` before the
    /// first load).  If it panics, the panic reaches the caller and the
    /// cached value is unchanged.
    pub fn update<F>(&self, updater: F) -> C
    where
        F: FnOnce(Option<C>) -> C,
    {
        let next = updater(self.get());
        self.set(next.clone());
        next
    }

    /// Fallible [`update`](Self::update).
    ///
    /// # Errors
    ///
    /// Returns the updater's error unchanged; the cached value is not
    /// touched and no subscriber runs.
    pub fn try_update<F, E>(&self, updater: F) -> Result<C, E>
    where
        F: FnOnce(Option<C>) -> Result<C, E>,
    {
        let next = updater(self.get())?;
        self.set(next.clone());
        Ok(next)
    }

    /// Pulls the configuration from the persistence gateway.
    ///
    /// A fetched value replaces the cache and is returned.  An empty fetch
    /// returns `None` and leaves the cache alone, so a fresher local value is
    /// never clobbered by "nothing stored yet".
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Gateway`] if the fetch fails; the cache is not
    /// touched.
    pub async fn load(&self) -> Result<Option<C>, StoreError> {
        let fetched = self.inner.gateway.fetch().await?;
        if let Some(config) = &fetched {
            self.set(config.clone());
        }
        Ok(fetched)
    }

    /// Persists the cached value through the gateway.
    ///
    /// The value is read once, when the call starts; a `set` that lands while
    /// the request is in flight is not included.  With nothing cached this is
    /// a successful no-op that never reaches the gateway.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Gateway`] if the persist request fails.
    pub async fn save(&self) -> Result<(), StoreError> {
        let Some(current) = self.get() else {
            return Ok(());
        };
        self.inner.gateway.persist(&current).await?;
        Ok(())
    }

    /// Publishes `value` to every window, this one included if the bus
    /// delivers to its own publisher.
    ///
    /// Does not touch the cache and does not persist; the caller decides
    /// whether to `set` and `save` around it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Notification`] if `value` cannot be encoded as
    /// JSON.  Nothing is published in that case.
    pub fn broadcast(&self, value: &C) -> Result<(), StoreError> {
        let payload = encode_notification(&ChangeNotification::new(self.inner.window_id, value))?;
        debug!(window = %self.inner.window_id, "broadcasting configuration change");
        self.inner.bus.publish(CONFIG_UPDATE_TOPIC, payload);
        Ok(())
    }

    /// Applies one inbound bus payload.  Undecodable payloads are dropped.
    fn apply_notification(&self, payload: serde_json::Value) {
        match decode_notification::<C>(payload) {
            Ok(notification) => {
                debug!(
                    window = %self.inner.window_id,
                    origin = ?notification.origin,
                    "received configuration change"
                );
                self.set(notification.config);
            }
            Err(e) => {
                warn!(window = %self.inner.window_id, "ignoring configuration change: {e}");
            }
        }
    }
}

/// Handle returned by [`ConfigStore::subscribe`].
pub struct Subscription {
    unsubscribe: Box<dyn FnOnce() + Send>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Box::new(unsubscribe),
        }
    }

    /// Removes the callback; it will not be invoked again.
    pub fn unsubscribe(self) {
        (self.unsubscribe)();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bus::local::LocalBus;
    use async_trait::async_trait;
    use fishclock_core::Config;
    use mockall::{mock, predicate::eq};
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    // ── Test doubles ──────────────────────────────────────────────────────────

    mock! {
        pub Gateway {}

        #[async_trait]
        impl PersistenceGateway<Config> for Gateway {
            async fn fetch(&self) -> Result<Option<Config>, GatewayError>;
            async fn persist(&self, config: &Config) -> Result<(), GatewayError>;
        }
    }

    /// Records every publish and never delivers, so the publisher's own
    /// store is not updated by its broadcast.
    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<(String, serde_json::Value)>>,
        subscribed_topics: Mutex<Vec<String>>,
    }

    impl NotificationBus for RecordingBus {
        fn publish(&self, topic: &str, payload: serde_json::Value) {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
        }

        fn subscribe(&self, topic: &str, _handler: BusHandler) -> BusSubscription {
            self.subscribed_topics.lock().unwrap().push(topic.to_string());
            BusSubscription::new(|| {})
        }
    }

    /// Persist blocks until released, so a test can race a `set` against an
    /// in-flight save.
    #[derive(Default)]
    struct GatedGateway {
        persist_started: Notify,
        release: Notify,
        persisted: Mutex<Vec<Config>>,
    }

    #[async_trait]
    impl PersistenceGateway<Config> for GatedGateway {
        async fn fetch(&self) -> Result<Option<Config>, GatewayError> {
            Ok(None)
        }

        async fn persist(&self, config: &Config) -> Result<(), GatewayError> {
            self.persisted.lock().unwrap().push(config.clone());
            self.persist_started.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    fn config_with_opacity(opacity: f64) -> Config {
        Config {
            opacity,
            ..Config::default()
        }
    }

    fn make_store(gateway: MockGateway) -> ConfigStore<Config> {
        ConfigStore::new(Uuid::new_v4(), Arc::new(gateway), Arc::new(LocalBus::new()))
    }

    /// Subscribes a callback that records every value it receives.
    fn record_values(store: &ConfigStore<Config>) -> (Arc<Mutex<Vec<Option<Config>>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = store.subscribe(move |value| sink.lock().unwrap().push(value.cloned()));
        (seen, sub)
    }

    // ── subscribe / set / update ──────────────────────────────────────────────

    #[test]
    fn test_subscribe_replays_none_before_anything_is_loaded() {
        // Arrange
        let store = make_store(MockGateway::new());

        // Act
        let (seen, _sub) = record_values(&store);

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[test]
    fn test_subscribe_replays_current_value_then_every_set() {
        // Arrange
        let store = make_store(MockGateway::new());
        store.set(config_with_opacity(0.1));

        // Act
        let (seen, _sub) = record_values(&store);
        store.set(config_with_opacity(0.2));
        store.set(config_with_opacity(0.3));

        // Assert
        let opacities: Vec<f64> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|v| v.as_ref().unwrap().opacity)
            .collect();
        assert_eq!(opacities, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_set_invokes_subscribers_in_registration_order() {
        // Arrange
        let store = make_store(MockGateway::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Vec::new();
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            subs.push(store.subscribe(move |value| {
                if value.is_some() {
                    order.lock().unwrap().push(name);
                }
            }));
        }

        // Act
        store.set(Config::default());

        // Assert
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_subscriber_may_read_store_during_notification() {
        // Arrange: a callback that calls back into the store must not deadlock
        let store = make_store(MockGateway::new());
        let reader = store.clone();
        let observed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&observed);
        let _sub = store.subscribe(move |_| *sink.lock().unwrap() = reader.get());

        // Act
        store.set(config_with_opacity(0.6));

        // Assert
        assert_eq!(observed.lock().unwrap().as_ref().unwrap().opacity, 0.6);
    }

    #[test]
    fn test_set_from_two_threads_leaves_subscriber_on_cached_value() {
        use std::sync::mpsc;
        use std::time::Duration;

        // Arrange: the subscriber stalls while handling the first value, so
        // the second `set` lands while the first is still being delivered
        let store = make_store(MockGateway::new());
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |value: Option<&Config>| {
            let opacity = value.map(|c| c.opacity);
            if opacity == Some(0.1) {
                entered_tx.lock().unwrap().send(()).unwrap();
                std::thread::sleep(Duration::from_millis(50));
            }
            sink.lock().unwrap().push(opacity);
        });

        // Act
        let first = {
            let store = store.clone();
            std::thread::spawn(move || store.set(config_with_opacity(0.1)))
        };
        entered_rx.recv().unwrap();
        store.set(config_with_opacity(0.2));
        first.join().unwrap();

        // Assert: every change seen, in order, ending on the cached value
        assert_eq!(store.get().unwrap().opacity, 0.2);
        assert_eq!(*seen.lock().unwrap(), vec![None, Some(0.1), Some(0.2)]);
    }

    #[test]
    fn test_set_inside_callback_is_delivered_after_current_round() {
        // Arrange: the first subscriber reacts to 0.1 by setting 0.2
        let store = make_store(MockGateway::new());
        let writer = store.clone();
        let _reactor = store.subscribe(move |value: Option<&Config>| {
            if value.map(|c| c.opacity) == Some(0.1) {
                writer.set(config_with_opacity(0.2));
            }
        });
        let (seen, _sub) = record_values(&store);

        // Act
        store.set(config_with_opacity(0.1));

        // Assert: the later subscriber still sees 0.1 before 0.2
        let opacities: Vec<Option<f64>> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|v| v.as_ref().map(|c| c.opacity))
            .collect();
        assert_eq!(opacities, vec![None, Some(0.1), Some(0.2)]);
        assert_eq!(store.get().unwrap().opacity, 0.2);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_later_deliveries() {
        // Arrange
        let store = make_store(MockGateway::new());
        let _faulty = store.subscribe(|value: Option<&Config>| {
            if value.map(|c| c.payday) == Some(13) {
                panic!("subscriber failed");
            }
        });
        let (seen, _sub) = record_values(&store);
        let unlucky = Config {
            payday: 13,
            ..Config::default()
        };

        // Act
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.set(unlucky.clone());
        }));
        store.set(config_with_opacity(0.4));

        // Assert
        assert!(result.is_err());
        assert_eq!(
            seen.lock().unwrap().last().unwrap().as_ref().unwrap().opacity,
            0.4
        );
    }

    #[test]
    fn test_update_returns_stored_value() {
        let store = make_store(MockGateway::new());

        let stored = store.update(|_| config_with_opacity(0.25));

        assert_eq!(stored, config_with_opacity(0.25));
        assert_eq!(store.get(), Some(stored));
    }

    #[test]
    fn test_unsubscribe_stops_further_callbacks() {
        // Arrange
        let store = make_store(MockGateway::new());
        let (seen, sub) = record_values(&store);

        // Act
        sub.unsubscribe();
        store.set(Config::default());

        // Assert: only the initial replay was recorded
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_update_receives_current_value() {
        // Arrange
        let store = make_store(MockGateway::new());
        store.set(config_with_opacity(0.5));

        // Act
        store.update(|current| {
            let mut cfg = current.expect("value was set");
            cfg.payday = 1;
            cfg
        });

        // Assert
        let cfg = store.get().unwrap();
        assert_eq!(cfg.opacity, 0.5);
        assert_eq!(cfg.payday, 1);
    }

    #[test]
    fn test_update_receives_none_before_load() {
        let store = make_store(MockGateway::new());
        store.update(|current| {
            assert!(current.is_none());
            Config::default()
        });
        assert_eq!(store.get(), Some(Config::default()));
    }

    #[test]
    fn test_try_update_error_leaves_value_and_subscribers_untouched() {
        // Arrange
        let store = make_store(MockGateway::new());
        store.set(config_with_opacity(0.5));
        let (seen, _sub) = record_values(&store);

        // Act
        let result: Result<Config, &str> = store.try_update(|_| Err("bad edit"));

        // Assert
        assert_eq!(result, Err("bad edit"));
        assert_eq!(store.get().unwrap().opacity, 0.5);
        assert_eq!(seen.lock().unwrap().len(), 1, "only the initial replay");
    }

    #[test]
    fn test_panicking_updater_propagates_and_leaves_value() {
        // Arrange
        let store = make_store(MockGateway::new());
        store.set(config_with_opacity(0.5));

        // Act
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.update(|_| panic!("updater failed"));
        }));

        // Assert
        assert!(result.is_err());
        assert_eq!(store.get().unwrap().opacity, 0.5);
    }

    // ── load ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_load_overwrites_cache_and_notifies_once() {
        // Arrange
        let fetched = config_with_opacity(0.3);
        let mut gateway = MockGateway::new();
        let returned = fetched.clone();
        gateway
            .expect_fetch()
            .times(1)
            .returning(move || Ok(Some(returned.clone())));
        let store = make_store(gateway);
        let (seen, _sub) = record_values(&store);

        // Act
        let result = store.load().await;

        // Assert
        assert_eq!(assert_ok!(result), Some(fetched.clone()));
        assert_eq!(store.get(), Some(fetched.clone()));
        assert_eq!(*seen.lock().unwrap(), vec![None, Some(fetched)]);
    }

    #[tokio::test]
    async fn test_load_empty_result_preserves_none() {
        let mut gateway = MockGateway::new();
        gateway.expect_fetch().times(1).returning(|| Ok(None));
        let store = make_store(gateway);

        let result = store.load().await;

        assert_eq!(assert_ok!(result), None);
        assert_eq!(store.get(), None);
    }

    #[tokio::test]
    async fn test_load_empty_result_preserves_local_value() {
        // Arrange
        let mut gateway = MockGateway::new();
        gateway.expect_fetch().times(1).returning(|| Ok(None));
        let store = make_store(gateway);
        store.set(config_with_opacity(0.8));
        let (seen, _sub) = record_values(&store);

        // Act
        let result = store.load().await;

        // Assert
        assert_eq!(assert_ok!(result), None);
        assert_eq!(store.get().unwrap().opacity, 0.8);
        assert_eq!(seen.lock().unwrap().len(), 1, "no notification on empty load");
    }

    #[tokio::test]
    async fn test_load_failure_propagates_and_preserves_cache() {
        // Arrange
        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch()
            .times(1)
            .returning(|| Err(GatewayError::new("backend down")));
        let store = make_store(gateway);
        store.set(config_with_opacity(0.8));

        // Act
        let result = store.load().await;

        // Assert
        let err = assert_err!(result);
        assert!(matches!(err, StoreError::Gateway(ref e) if e.message == "backend down"));
        assert_eq!(store.get().unwrap().opacity, 0.8);
    }

    // ── save ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_save_without_value_never_calls_persist() {
        let mut gateway = MockGateway::new();
        gateway.expect_persist().times(0);
        let store = make_store(gateway);

        assert_ok!(store.save().await);
    }

    #[tokio::test]
    async fn test_save_persists_exactly_the_cached_value() {
        // Arrange
        let cached = config_with_opacity(0.25);
        let mut gateway = MockGateway::new();
        gateway
            .expect_persist()
            .with(eq(cached.clone()))
            .times(1)
            .returning(|_| Ok(()));
        let store = make_store(gateway);
        store.set(cached);

        // Act / Assert
        assert_ok!(store.save().await);
    }

    #[tokio::test]
    async fn test_save_failure_propagates_and_keeps_cache() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_persist()
            .times(1)
            .returning(|_| Err(GatewayError::new("disk full")));
        let store = make_store(gateway);
        store.set(config_with_opacity(0.25));

        let err = assert_err!(store.save().await);

        assert_eq!(err.to_string(), "configuration service request failed: disk full");
        assert_eq!(store.get().unwrap().opacity, 0.25);
    }

    #[tokio::test]
    async fn test_save_uses_value_read_when_call_started() {
        // Arrange
        let gateway = Arc::new(GatedGateway::default());
        let store: ConfigStore<Config> = ConfigStore::new(
            Uuid::new_v4(),
            Arc::clone(&gateway) as Arc<dyn PersistenceGateway<Config>>,
            Arc::new(LocalBus::new()),
        );
        store.set(config_with_opacity(0.1));

        // Act: start the save, then change the cache while persist is pending
        let saving = tokio::spawn({
            let store = store.clone();
            async move { store.save().await }
        });
        gateway.persist_started.notified().await;
        store.set(config_with_opacity(0.9));
        gateway.release.notify_one();
        let result = saving.await.expect("save task must not panic");

        // Assert
        assert_ok!(result);
        assert_eq!(*gateway.persisted.lock().unwrap(), vec![config_with_opacity(0.1)]);
        assert_eq!(store.get().unwrap().opacity, 0.9);
    }

    // ── broadcast / inbound notifications ─────────────────────────────────────

    #[test]
    fn test_new_store_subscribes_to_config_topic() {
        let bus = Arc::new(RecordingBus::default());
        let _store: ConfigStore<Config> =
            ConfigStore::new(Uuid::new_v4(), Arc::new(MockGateway::new()), bus.clone());

        assert_eq!(*bus.subscribed_topics.lock().unwrap(), vec![CONFIG_UPDATE_TOPIC]);
    }

    #[test]
    fn test_broadcast_publishes_envelope_without_touching_cache_or_gateway() {
        // Arrange: no gateway expectations, so any call would panic
        let bus = Arc::new(RecordingBus::default());
        let window = Uuid::new_v4();
        let store: ConfigStore<Config> =
            ConfigStore::new(window, Arc::new(MockGateway::new()), bus.clone());
        let value = config_with_opacity(0.7);

        // Act
        assert_ok!(store.broadcast(&value));

        // Assert
        let published = bus.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, CONFIG_UPDATE_TOPIC);
        let decoded: ChangeNotification<Config> =
            decode_notification(published[0].1.clone()).unwrap();
        assert_eq!(decoded.origin, Some(window));
        assert_eq!(decoded.config, value);
        assert_eq!(store.get(), None, "broadcast must not set the local value");
    }

    #[test]
    fn test_inbound_notification_overwrites_cache_and_notifies() {
        // Arrange
        let bus = Arc::new(LocalBus::new());
        let store: ConfigStore<Config> =
            ConfigStore::new(Uuid::new_v4(), Arc::new(MockGateway::new()), bus.clone());
        store.set(config_with_opacity(0.2));
        let (seen, _sub) = record_values(&store);
        let incoming = ChangeNotification::new(Uuid::new_v4(), config_with_opacity(0.4));

        // Act
        bus.publish(CONFIG_UPDATE_TOPIC, encode_notification(&incoming).unwrap());

        // Assert
        assert_eq!(store.get().unwrap().opacity, 0.4);
        assert_eq!(seen.lock().unwrap().last().unwrap().as_ref().unwrap().opacity, 0.4);
    }

    #[test]
    fn test_last_inbound_notification_wins() {
        let bus = Arc::new(LocalBus::new());
        let store: ConfigStore<Config> =
            ConfigStore::new(Uuid::new_v4(), Arc::new(MockGateway::new()), bus.clone());

        for opacity in [0.1, 0.2] {
            let n = ChangeNotification::new(Uuid::new_v4(), config_with_opacity(opacity));
            bus.publish(CONFIG_UPDATE_TOPIC, encode_notification(&n).unwrap());
        }
        store.set(config_with_opacity(0.5));
        let n = ChangeNotification::new(Uuid::new_v4(), config_with_opacity(0.3));
        bus.publish(CONFIG_UPDATE_TOPIC, encode_notification(&n).unwrap());

        assert_eq!(store.get().unwrap().opacity, 0.3);
    }

    #[test]
    fn test_duplicate_notification_is_idempotent() {
        let bus = Arc::new(LocalBus::new());
        let store: ConfigStore<Config> =
            ConfigStore::new(Uuid::new_v4(), Arc::new(MockGateway::new()), bus.clone());
        let payload =
            encode_notification(&ChangeNotification::new(Uuid::new_v4(), config_with_opacity(0.4)))
                .unwrap();

        bus.publish(CONFIG_UPDATE_TOPIC, payload.clone());
        bus.publish(CONFIG_UPDATE_TOPIC, payload);

        assert_eq!(store.get(), Some(config_with_opacity(0.4)));
    }

    #[test]
    fn test_inbound_bare_record_overwrites_cache() {
        // Arrange: a publisher that sends the record without an envelope
        let bus = Arc::new(LocalBus::new());
        let store: ConfigStore<Config> =
            ConfigStore::new(Uuid::new_v4(), Arc::new(MockGateway::new()), bus.clone());
        let (seen, _sub) = record_values(&store);

        // Act
        bus.publish(
            CONFIG_UPDATE_TOPIC,
            serde_json::to_value(config_with_opacity(0.4)).unwrap(),
        );

        // Assert
        assert_eq!(store.get(), Some(config_with_opacity(0.4)));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_notification_is_ignored() {
        // Arrange
        let bus = Arc::new(LocalBus::new());
        let store: ConfigStore<Config> =
            ConfigStore::new(Uuid::new_v4(), Arc::new(MockGateway::new()), bus.clone());
        store.set(config_with_opacity(0.2));

        // Act
        bus.publish(CONFIG_UPDATE_TOPIC, serde_json::json!({ "unexpected": true }));
        bus.publish(CONFIG_UPDATE_TOPIC, serde_json::json!({ "opacity": "opaque" }));
        bus.publish(CONFIG_UPDATE_TOPIC, serde_json::json!("not a record"));

        // Assert
        assert_eq!(store.get().unwrap().opacity, 0.2);
    }

    #[test]
    fn test_self_delivered_broadcast_applies_published_value() {
        // LocalBus delivers to the publisher too; the store must accept it.
        let bus = Arc::new(LocalBus::new());
        let store: ConfigStore<Config> =
            ConfigStore::new(Uuid::new_v4(), Arc::new(MockGateway::new()), bus);

        assert_ok!(store.broadcast(&config_with_opacity(0.35)));

        assert_eq!(store.get().unwrap().opacity, 0.35);
    }

    #[test]
    fn test_dropping_last_handle_leaves_bus_topic() {
        // Arrange
        let bus = Arc::new(LocalBus::new());
        let store: ConfigStore<Config> =
            ConfigStore::new(Uuid::new_v4(), Arc::new(MockGateway::new()), bus.clone());
        let second_handle = store.clone();
        assert_eq!(bus.subscriber_count(CONFIG_UPDATE_TOPIC), 1);

        // Act / Assert
        drop(store);
        assert_eq!(bus.subscriber_count(CONFIG_UPDATE_TOPIC), 1, "a handle is still alive");
        drop(second_handle);
        assert_eq!(bus.subscriber_count(CONFIG_UPDATE_TOPIC), 0);
    }
}
