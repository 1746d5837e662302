//! PersistenceGateway: the store's view of the backend configuration service.
//!
//! The backend owns the durable copy of the configuration.  A window reaches
//! it through two request/response calls, both safe to retry:
//!
//! - `fetch`   – returns the stored record, or `None` if there is none yet.
//! - `persist` – replaces the stored record.
//!
//! Failures carry no taxonomy beyond "the request failed"; the message is for
//! humans only.

use async_trait::async_trait;
use thiserror::Error;

/// A fetch or persist request to the configuration service failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("configuration service request failed: {message}")]
pub struct GatewayError {
    pub message: String,
}

impl GatewayError {
    /// Creates an error carrying a human-readable reason.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Request/response access to the backend-owned configuration.
///
/// Infrastructure implementations call the host service; test
/// implementations record calls.
#[async_trait]
pub trait PersistenceGateway<C>: Send + Sync {
    /// Reads the stored configuration.  `Ok(None)` means nothing is stored yet.
    async fn fetch(&self) -> Result<Option<C>, GatewayError>;

    /// Replaces the stored configuration with `config`.
    async fn persist(&self, config: &C) -> Result<(), GatewayError>;
}
