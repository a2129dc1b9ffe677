//! Configuration loader for chaosflow.
//!
//! Reads `config.toml` from the data directory (`~/.chaosflow/` by default)
//! and deserializes it into [`ChaosflowConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use chaosflow_types::config::ChaosflowConfig;

/// Path of the configuration file inside a data directory.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ChaosflowConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> ChaosflowConfig {
    let config_path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ChaosflowConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ChaosflowConfig::default();
        }
    };

    match toml::from_str::<ChaosflowConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ChaosflowConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaosflow_types::config::{DEFAULT_API_VERSION, OutputFormat};
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.output, OutputFormat::Yaml);
        assert!(config.namespace.is_none());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            config_path(tmp.path()),
            r#"
namespace = "chaos-testing"
output = "json"
workflows_dir = "/srv/workflows"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.namespace.as_deref(), Some("chaos-testing"));
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.workflows_dir, Some(PathBuf::from("/srv/workflows")));
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(config_path(tmp.path()), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config, ChaosflowConfig::default());
    }

    #[tokio::test]
    async fn load_config_unknown_output_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(config_path(tmp.path()), "output = \"xml\"\n")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.output, OutputFormat::Yaml);
    }
}
