use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use mediabroker_core::{Broker, Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    broker: Arc<Broker>,
    /// Cancelled on shutdown; every download runs under a child token.
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, broker: Arc<Broker>) -> Self {
        Self {
            config,
            broker,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn broker(&self) -> &Broker {
        self.broker.as_ref()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}
