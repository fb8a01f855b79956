//! Composition root: database, token store and client for one invocation.

use std::sync::Arc;

use anyhow::Context;
use nyuki_auth::{AuthError, KeyringTokenStore};
use nyuki_config::NyukiConfig;
use nyuki_core::entities::Session;
use nyuki_db::NyukiService;
use nyuki_sync::{Backends, NyukiClient};

pub struct AppContext {
    pub service: Arc<NyukiService>,
    pub tokens: Arc<KeyringTokenStore>,
    pub client: NyukiClient,
}

impl AppContext {
    /// Open the database, build the client, and restore any stored session.
    pub async fn init(config: NyukiConfig) -> anyhow::Result<Self> {
        let service = Arc::new(
            NyukiService::open(&config.backend)
                .await
                .with_context(|| {
                    format!("failed to open database at {}", config.backend.database_path)
                })?,
        );
        let tokens = Arc::new(KeyringTokenStore::new(
            config.session.keyring_service.clone(),
        )?);
        let client = NyukiClient::new(Backends::shared(&service), tokens.clone(), &config);

        let signed_in = client.restore().await;
        tracing::debug!(signed_in, "session restore finished");

        Ok(Self {
            service,
            tokens,
            client,
        })
    }

    /// The live session, or `NotAuthenticated`.
    pub fn require_session(&self) -> anyhow::Result<Session> {
        self.client
            .session()
            .current()
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    /// Ensure both collections have been loaded at least once.
    pub async fn require_loaded(&self) -> anyhow::Result<()> {
        self.require_session()?;
        if !self.client.apiaries().is_loaded() || !self.client.hives().is_loaded() {
            self.client
                .refresh()
                .await
                .context("failed to load apiaries and hives")?;
        }
        Ok(())
    }
}
