//! Domain entities for Fish Clock.
//!
//! This module contains pure data types with no infrastructure dependencies.
//! Everything here can be compiled and tested on any platform without a
//! window system, a file system, or an async runtime.

/// The application settings record shared by every window.
///
/// See [`config::Config`] for the main type.
pub mod config;

/// Top-level view selection from a URL fragment.
pub mod view;
