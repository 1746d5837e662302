//! `PersistenceGateway` implementations.
//!
//! - **`host`** – `HostGateway`: calls the backend `ConfigService` through
//!   the same commands the views use.
//! - **`mock`** – `MemoryGateway`: keeps the value in memory and records
//!   every persist, for tests.

pub mod host;
pub mod mock;
