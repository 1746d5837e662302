//! In-memory persistence gateway for tests.
//!
//! # Why an in-memory gateway?
//!
//! The real gateway talks to the backend service, which writes a TOML file
//! in the user's config directory.  Tests must not touch that file, and they
//! need to see exactly what was persisted and in what order.
//!
//! `MemoryGateway` keeps the "stored" value in a `Mutex<Option<C>>` and
//! pushes every persisted value onto a `Mutex<Vec<C>>`.  Several windows can
//! share one `MemoryGateway` through an `Arc` to act as a common backend.
//!
//! # `should_fail` flag
//!
//! Build it with [`MemoryGateway::failing`] to make every call return a
//! [`GatewayError`].  This exercises the error paths of callers without
//! needing a broken disk.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::gateway::{GatewayError, PersistenceGateway};

/// A gateway that stores the configuration in memory.
pub struct MemoryGateway<C> {
    /// The value `fetch` returns; replaced by each successful `persist`.
    stored: Mutex<Option<C>>,
    /// Every value passed to `persist`, in call order.
    persisted: Mutex<Vec<C>>,
    /// Number of `fetch` calls, successful or not.
    fetches: AtomicUsize,
    /// When `true`, every call returns a `GatewayError`.
    pub should_fail: bool,
}

impl<C> Default for MemoryGateway<C> {
    fn default() -> Self {
        Self {
            stored: Mutex::new(None),
            persisted: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            should_fail: false,
        }
    }
}

impl<C: Clone> MemoryGateway<C> {
    /// Creates a gateway with nothing stored, so `fetch` returns `Ok(None)`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway whose `fetch` returns `value`.
    pub fn with_value(value: C) -> Self {
        Self {
            stored: Mutex::new(Some(value)),
            ..Self::default()
        }
    }

    /// Makes every subsequent call fail.
    pub fn failing(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// The value currently stored.
    pub fn stored(&self) -> Option<C> {
        self.stored.lock().unwrap().clone()
    }

    /// Every value passed to `persist`, in call order (failed calls excluded).
    pub fn persisted(&self) -> Vec<C> {
        self.persisted.lock().unwrap().clone()
    }

    /// Number of `fetch` calls made so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C> PersistenceGateway<C> for MemoryGateway<C>
where
    C: Clone + Send + Sync,
{
    async fn fetch(&self) -> Result<Option<C>, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(GatewayError::new("mock failure"));
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn persist(&self, config: &C) -> Result<(), GatewayError> {
        if self.should_fail {
            return Err(GatewayError::new("mock failure"));
        }
        *self.stored.lock().unwrap() = Some(config.clone());
        self.persisted.lock().unwrap().push(config.clone());
        Ok(())
    }
}
