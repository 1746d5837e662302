//! Change-notification envelope exchanged between windows.
//!
//! # Wire format
//!
//! Windows do not share memory, so a notification crosses the bus as a JSON
//! value.  The envelope is always the full record plus the id of the window
//! that published it:
//!
//! ```json
//! {
//!   "origin": "9b0d7a4e-5c1f-4f7e-a1c2-3d4e5f607182",
//!   "config": { "workStartHour": 9, "workEndHour": 18, "...": "..." }
//! }
//! ```
//!
//! `origin` is informational only.  Receivers apply every notification,
//! including the ones they published themselves; applying the same whole
//! value twice is harmless.
//!
//! Publishers that predate the envelope emit the bare record on the same
//! topic.  [`decode_notification`] accepts that shape too and reports it
//! with no origin.  A bare object must carry at least one field, and only
//! fields the record knows; anything else is rejected rather than read as
//! an all-defaults record.
//!
//! The envelope carries no version or timestamp; the last notification to
//! arrive wins.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Bus topic on which configuration changes are published.
pub const CONFIG_UPDATE_TOPIC: &str = "config:update";

/// Identifies one running window.
pub type WindowId = Uuid;

/// Error type for notification encoding and decoding.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The configuration could not be converted to JSON.
    #[error("failed to encode change notification: {0}")]
    Encode(#[source] serde_json::Error),

    /// The payload is not a valid envelope for the expected configuration type.
    #[error("malformed change notification: {0}")]
    Decode(#[source] serde_json::Error),

    /// A bare payload is empty or carries fields the record does not have.
    #[error("payload is not a configuration record: {0}")]
    NotARecord(String),
}

/// A complete configuration value published by one window for all windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification<C> {
    /// The window that published the change; `None` for a bare record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<WindowId>,
    /// The whole configuration record.  Never a partial update.
    pub config: C,
}

impl<C> ChangeNotification<C> {
    /// Wraps `config` in an envelope attributed to `origin`.
    pub fn new(origin: WindowId, config: C) -> Self {
        Self {
            origin: Some(origin),
            config,
        }
    }
}

/// Encodes a notification into the JSON value published on the bus.
///
/// # Errors
///
/// Returns [`NotificationError::Encode`] if `C`'s `Serialize` impl fails
/// (for example a map with non-string keys).
pub fn encode_notification<C: Serialize>(
    notification: &ChangeNotification<C>,
) -> Result<serde_json::Value, NotificationError> {
    serde_json::to_value(notification).map_err(NotificationError::Encode)
}

/// Decodes a bus payload back into a typed notification.
///
/// An object with an `origin` or `config` key is read as an envelope;
/// anything else is read as a bare record.
///
/// # Errors
///
/// Returns [`NotificationError::Decode`] if the payload does not deserialize
/// into an envelope or into `C`, and [`NotificationError::NotARecord`] for a
/// bare object that is empty or has fields `C` does not know.
pub fn decode_notification<C>(
    payload: serde_json::Value,
) -> Result<ChangeNotification<C>, NotificationError>
where
    C: Serialize + DeserializeOwned,
{
    let is_envelope = payload
        .as_object()
        .is_some_and(|o| o.contains_key("origin") || o.contains_key("config"));
    if is_envelope {
        return serde_json::from_value(payload).map_err(NotificationError::Decode);
    }

    let config: C = serde_json::from_value(payload.clone()).map_err(NotificationError::Decode)?;
    if let serde_json::Value::Object(fields) = &payload {
        if fields.is_empty() {
            return Err(NotificationError::NotARecord("empty object".to_string()));
        }
        let known = serde_json::to_value(&config).map_err(NotificationError::Encode)?;
        let unknown: Vec<&str> = fields
            .keys()
            .filter(|key| known.get(key.as_str()).is_none())
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(NotificationError::NotARecord(format!(
                "unknown fields {}",
                unknown.join(", ")
            )));
        }
    }

    Ok(ChangeNotification {
        origin: None,
        config,
    })
}
