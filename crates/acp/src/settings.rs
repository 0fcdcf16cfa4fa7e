use async_trait::async_trait;

use crate::error::AcpError;

pub use acp_config::Settings;

/// Persists the shell's preferences. Declared as a trait seam so a GUI
/// shell can back it with its own store; [`JsonSettingsStore`] is the
/// default, backed by the same `config.json` the agent catalog lives in.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self) -> Result<Settings, AcpError>;
    async fn save(&self, settings: Settings) -> Result<(), AcpError>;
}

/// Reads and writes `settings` inside the on-disk `config.json`, leaving
/// `agents` and `mcpServers` untouched.
#[derive(Default)]
pub struct JsonSettingsStore;

impl JsonSettingsStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn get(&self) -> Result<Settings, AcpError> {
        let config = tokio::task::spawn_blocking(acp_config::load)
            .await
            .expect("blocking config load task panicked")?;
        Ok(config.settings)
    }

    async fn save(&self, settings: Settings) -> Result<(), AcpError> {
        tokio::task::spawn_blocking(move || {
            let mut config = acp_config::load()?;
            config.settings = settings;
            acp_config::save(&config)
        })
        .await
        .expect("blocking config save task panicked")?;
        Ok(())
    }
}
