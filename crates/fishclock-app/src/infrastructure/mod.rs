//! Infrastructure layer for Fish Clock.
//!
//! Contains the concrete collaborators behind the application-layer seams:
//! file storage, the backend configuration service and its command bridge,
//! gateway adapters, notification buses, and windows.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `fishclock_core`, but MUST NOT be imported by the `application` layer
//! outside of tests.
//!
//! # Sub-modules
//!
//! - **`storage`** – Reads and writes the TOML configuration file in the
//!   platform config directory.
//!
//! - **`ui_bridge`** – The backend `ConfigService` and the `get_config` /
//!   `update_config` commands the views call.
//!
//! - **`gateway`** – `PersistenceGateway` implementations: `HostGateway`
//!   (through the command bridge) and `MemoryGateway` (for tests).
//!
//! - **`bus`** – `NotificationBus` implementations: the synchronous
//!   `LocalBus` and the tokio-backed `EventBus`.
//!
//! - **`window`** – A window: a view plus its own configuration store.

pub mod bus;
pub mod gateway;
pub mod storage;
pub mod ui_bridge;
pub mod window;
