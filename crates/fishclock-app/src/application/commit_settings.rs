//! CommitSettings: the settings panel's save button.
//!
//! The store keeps `save` and `broadcast` independent; whoever drives the UI
//! decides their order.  The settings panel commits an edit in three steps:
//!
//! 1. Apply the edit to its own replica (`update`).
//! 2. Persist the replica through the backend (`save`).
//! 3. Publish the value just persisted to every other window (`broadcast`).
//!
//! Peers are only told about values the backend accepted.  If the save
//! fails the edit stays in the local replica, so the user can retry without
//! retyping it.

use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::application::config_store::{ConfigStore, StoreError};

/// Applies `edit` to the current value, persists it, and broadcasts it.
///
/// Returns the committed value.
///
/// # Errors
///
/// Returns [`StoreError::Gateway`] if the save fails (nothing is broadcast),
/// or [`StoreError::Notification`] if the committed value cannot be encoded
/// for the bus (it has already been persisted at that point).
pub async fn commit_settings<C, F>(store: &ConfigStore<C>, edit: F) -> Result<C, StoreError>
where
    C: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    F: FnOnce(Option<C>) -> C,
{
    let committed = store.update(edit);
    store.save().await?;
    store.broadcast(&committed)?;
    info!(window = %store.window_id(), "settings committed");
    Ok(committed)
}
