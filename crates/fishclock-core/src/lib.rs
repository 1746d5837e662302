//! # fishclock-core
//!
//! Shared library for Fish Clock containing the configuration record, the
//! view selector, and the change-notification envelope that windows exchange
//! over the notification bus.
//!
//! This crate is used by every window and by the backend configuration
//! service.  It has zero dependencies on OS APIs, async runtimes, or UI
//! frameworks.
//!
//! # Architecture overview (for beginners)
//!
//! Fish Clock is a small desktop clock with two kinds of windows: the main
//! display and a settings panel.  Each window runs independently with its own
//! memory, so the single configuration record is *replicated*: every window
//! keeps its own copy and converges with the others by exchanging messages.
//!
//! - **`domain`** – Pure data with no I/O.  [`Config`] is the settings record
//!   and [`View`] decides which top-level view a window renders.
//!
//! - **`protocol`** – How a configuration change travels between windows.
//!   A [`ChangeNotification`] always carries the *whole* record (never a
//!   delta) and is encoded as JSON on the [`CONFIG_UPDATE_TOPIC`] topic.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `fishclock_core::Config` instead of `fishclock_core::domain::config::Config`.
pub use domain::config::{Config, ConfigValidationError};
pub use domain::view::View;
pub use protocol::notification::{
    decode_notification, encode_notification, ChangeNotification, NotificationError, WindowId,
    CONFIG_UPDATE_TOPIC,
};
