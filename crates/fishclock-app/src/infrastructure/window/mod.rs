//! Window: one open view and the configuration replica it owns.
//!
//! The host opens a window per view.  Each window gets a fresh id and its
//! own [`ConfigStore`], subscribed to the bus from the moment the window
//! exists.  Windows share nothing but the gateway (the backend service) and
//! the bus.

use std::sync::Arc;

use fishclock_core::{Config, View, WindowId};
use tracing::info;
use uuid::Uuid;

use crate::application::bus::NotificationBus;
use crate::application::config_store::ConfigStore;
use crate::application::gateway::PersistenceGateway;

/// An open window.
pub struct Window {
    id: WindowId,
    view: View,
    store: ConfigStore<Config>,
}

impl Window {
    /// Opens a window rendering `view`.
    ///
    /// The store starts empty; the view is expected to call
    /// [`ConfigStore::load`] once it mounts.
    pub fn open(
        view: View,
        gateway: Arc<dyn PersistenceGateway<Config>>,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        let id = Uuid::new_v4();
        let store = ConfigStore::new(id, gateway, bus);
        info!(window = %id, url = view.url(), "window opened");
        Self { id, view, store }
    }

    /// Opens a window whose view is chosen from a URL fragment.
    pub fn from_url_fragment(
        fragment: &str,
        gateway: Arc<dyn PersistenceGateway<Config>>,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        Self::open(View::from_fragment(fragment), gateway, bus)
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// The URL the window's web view loads.
    pub fn url(&self) -> &'static str {
        self.view.url()
    }

    /// This window's configuration replica.
    pub fn store(&self) -> &ConfigStore<Config> {
        &self.store
    }

    /// Closes the window, discarding its replica.
    ///
    /// Once no other handle to the store is alive the bus subscription is
    /// dropped and the window stops receiving notifications.
    pub fn close(self) {
        info!(window = %self.id, "window closed");
    }
}
