//! Storage infrastructure: the durable configuration file.
//!
//! The `config` sub-module reads and writes the single TOML file the backend
//! service owns.  Only `ConfigService` calls into it; windows reach the file
//! through the service, never directly.

pub mod config;
