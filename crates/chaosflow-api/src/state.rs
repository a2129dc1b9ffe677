//! Application state shared by every command handler.

use chaosflow_infra::config::load_config;
use chaosflow_infra::filesystem::{LocalFileSystem, resolve_data_dir};
use chaosflow_types::config::ChaosflowConfig;

pub struct AppState {
    pub config: ChaosflowConfig,
    pub fs: LocalFileSystem,
}

impl AppState {
    /// Resolve the data directory and load `config.toml` from it.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_config(&data_dir).await;
        let fs = LocalFileSystem::from_config(&config, &data_dir);
        tracing::debug!(
            data_dir = %data_dir.display(),
            workflows_dir = %fs.workflows_dir().display(),
            "initialized state"
        );
        Ok(Self { config, fs })
    }
}
