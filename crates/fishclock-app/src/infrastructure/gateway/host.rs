//! HostGateway: the persistence gateway a real window uses.
//!
//! A window never touches the configuration file.  It asks the host's
//! backend service through the command bridge, exactly as the web view's
//! generated bindings would, and turns a failed `CommandResult` into a
//! [`GatewayError`].

use std::sync::Arc;

use async_trait::async_trait;
use fishclock_core::Config;

use crate::application::gateway::{GatewayError, PersistenceGateway};
use crate::infrastructure::ui_bridge::{self, CommandResult, ConfigService};

/// Persistence gateway backed by the host's [`ConfigService`].
#[derive(Clone)]
pub struct HostGateway {
    service: Arc<ConfigService>,
}

impl HostGateway {
    pub fn new(service: Arc<ConfigService>) -> Self {
        Self { service }
    }
}

fn into_gateway_result<T: serde::Serialize>(
    result: CommandResult<T>,
) -> Result<Option<T>, GatewayError> {
    if result.success {
        Ok(result.data)
    } else {
        Err(GatewayError::new(
            result.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

#[async_trait]
impl PersistenceGateway<Config> for HostGateway {
    async fn fetch(&self) -> Result<Option<Config>, GatewayError> {
        into_gateway_result(ui_bridge::get_config(Arc::clone(&self.service)).await)
    }

    async fn persist(&self, config: &Config) -> Result<(), GatewayError> {
        into_gateway_result(
            ui_bridge::update_config(Arc::clone(&self.service), config.clone()).await,
        )
        .map(|_| ())
    }
}
