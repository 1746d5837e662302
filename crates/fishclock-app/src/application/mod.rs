//! Application layer for Fish Clock windows.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure data in `fishclock_core`) and the infrastructure (files, buses,
//! windows).  Code in this layer:
//!
//! - **Depends on abstractions** (traits) rather than concrete
//!   implementations, so the backend service and the event transport can be
//!   swapped for fakes in tests.
//! - **Contains no file system access and no runtime-specific I/O**.
//!
//! # Sub-modules
//!
//! - **`gateway`** – The [`PersistenceGateway`](gateway::PersistenceGateway)
//!   seam: `fetch` and `persist` against the backend configuration service.
//!
//! - **`bus`** – The [`NotificationBus`](bus::NotificationBus) seam: topic
//!   based publish/subscribe shared by every window of the application.
//!
//! - **`config_store`** – The per-window replica of the configuration.  This
//!   is the only place where cross-window consistency is handled.
//!
//! - **`commit_settings`** – The settings panel's save button: apply the
//!   edit, persist it, then tell the other windows.

pub mod bus;
pub mod commit_settings;
pub mod config_store;
pub mod gateway;
