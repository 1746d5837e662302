//! fishclock-app library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does fishclock-app do? (for beginners)
//!
//! Fish Clock opens more than one window: the clock display and, on demand,
//! a settings panel.  Each window has its own memory, so each keeps its own
//! copy of the configuration inside a [`ConfigStore`](application::config_store::ConfigStore).
//! The copies converge by message passing:
//!
//! 1. A window boots and its store subscribes to the notification bus.
//! 2. The view calls `load()` to pull the current record from the backend
//!    configuration service.
//! 3. The settings panel edits its copy, calls `save()` to persist it, then
//!    `broadcast()` to tell every other window.
//! 4. Every store that receives the notification replaces its copy with the
//!    published value.
//!
//! The backend service owns the durable TOML file and is the eventual
//! source of truth.

/// Application layer: the configuration store and the seams it depends on.
pub mod application;

/// Infrastructure layer: file storage, backend service, buses, and windows.
pub mod infrastructure;
