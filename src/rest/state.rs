//! API state management for the REST server.

use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::order::{FileOrderStore, MemoryOrderStore, OrderCommitter, OrderStore};
use crate::render::{HtmlRenderer, RenderError};
use crate::schema::{BuiltinSchemaProvider, CartContext, FieldSchemaProvider, Settings};
use crate::session::{FileSessionBackend, MemorySessionBackend, SessionBackend, SessionStore};
use crate::substeps::SubstepController;

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub provider: Arc<dyn FieldSchemaProvider>,
    pub sessions: Arc<dyn SessionBackend>,
    pub orders: Arc<dyn OrderStore>,
    pub renderer: Arc<HtmlRenderer>,
}

impl ApiState {
    /// Create state with the backends named in the config
    pub fn new(config: Config) -> Result<Self, RenderError> {
        let sessions: Arc<dyn SessionBackend> = match config.session.backend {
            StorageBackend::File => Arc::new(FileSessionBackend::new(config.sessions_path())),
            StorageBackend::Memory => Arc::new(MemorySessionBackend::new()),
        };
        let orders: Arc<dyn OrderStore> = match config.commit.backend {
            StorageBackend::File => Arc::new(FileOrderStore::new(config.orders_path())),
            StorageBackend::Memory => Arc::new(MemoryOrderStore::new()),
        };
        Self::with_backends(config, sessions, orders)
    }

    pub fn with_backends(
        config: Config,
        sessions: Arc<dyn SessionBackend>,
        orders: Arc<dyn OrderStore>,
    ) -> Result<Self, RenderError> {
        Ok(Self {
            config: Arc::new(config),
            provider: Arc::new(BuiltinSchemaProvider::new()),
            sessions,
            orders,
            renderer: Arc::new(HtmlRenderer::new()?),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.config.checkout
    }

    /// Session handle for one customer
    pub fn session(&self, session_id: &str) -> SessionStore {
        SessionStore::new(self.sessions.clone(), session_id)
            .with_retry(self.config.session.write_retry)
    }

    /// Fresh controller for one request
    pub fn controller(&self, session_id: &str, cart: CartContext) -> SubstepController {
        SubstepController::new(
            self.provider.clone(),
            self.settings().clone(),
            cart,
            self.session(session_id),
        )
    }

    pub fn committer(&self) -> OrderCommitter {
        OrderCommitter::new(self.provider.clone(), self.orders.clone())
            .with_retry_config(self.config.commit.retry, self.config.commit.timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_api_state_new_with_file_backends() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();

        let state = ApiState::new(config).unwrap();
        assert_eq!(state.session("abc").session_id(), "abc");
        assert!(!state.settings().gift_options.enabled);
    }

    #[tokio::test]
    async fn test_session_uses_configured_retry() {
        let backend = Arc::new(MemorySessionBackend::new());
        let mut config = Config::default();
        config.session.write_retry = crate::retry::RetryPolicy::immediate(0);
        let state =
            ApiState::with_backends(config, backend.clone(), Arc::new(MemoryOrderStore::new()))
                .unwrap();

        backend.fail_next_writes(1);
        let schema = state.provider.resolve("order_notes", state.settings());
        assert!(state
            .session("s1")
            .set(&schema, Default::default())
            .await
            .is_err());
        assert_eq!(backend.write_attempts(), 1);
    }
}
