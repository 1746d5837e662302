//! Notification bus implementations.
//!
//! - **`local`** – `LocalBus`: delivers synchronously on the publisher's
//!   thread.  Deterministic, so it doubles as the fake bus in tests.
//! - **`event_bus`** – `EventBus`: one tokio broadcast channel per topic,
//!   delivered asynchronously by a task per subscription.

pub mod event_bus;
pub mod local;
