//! Configuration types for chaosflow.
//!
//! `ChaosflowConfig` represents the top-level `config.toml` that controls
//! manifest defaults and CLI output.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default `apiVersion` stamped on encoded manifests.
pub const DEFAULT_API_VERSION: &str = "chaos-mesh.org/v1alpha1";

/// Top-level configuration.
///
/// Loaded from `~/.chaosflow/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosflowConfig {
    /// `apiVersion` written into encoded manifests.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Namespace written into manifest metadata when the workflow has none.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Default output format for `convert`.
    #[serde(default)]
    pub output: OutputFormat,

    /// Directory scanned for workflow files.
    #[serde(default)]
    pub workflows_dir: Option<PathBuf>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Default for ChaosflowConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            namespace: None,
            output: OutputFormat::default(),
            workflows_dir: None,
        }
    }
}

/// Serialized form written by `convert`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Backend manifest as YAML.
    #[default]
    Yaml,
    /// Backend manifest as JSON.
    Json,
    /// Nested authoring document as JSON.
    Nested,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Nested => write!(f, "nested"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yaml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            "nested" => Ok(OutputFormat::Nested),
            other => Err(format!("invalid output format: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = ChaosflowConfig::default();
        assert_eq!(config.api_version, "chaos-mesh.org/v1alpha1");
        assert!(config.namespace.is_none());
        assert_eq!(config.output, OutputFormat::Yaml);
        assert!(config.workflows_dir.is_none());
    }

    #[test]
    fn test_config_deserialize_with_defaults() {
        let config: ChaosflowConfig = toml::from_str("").unwrap();
        assert_eq!(config, ChaosflowConfig::default());
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
api_version = "chaos-mesh.org/v1beta1"
namespace = "chaos-testing"
output = "nested"
workflows_dir = "/srv/workflows"
"#;
        let config: ChaosflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_version, "chaos-mesh.org/v1beta1");
        assert_eq!(config.namespace.as_deref(), Some("chaos-testing"));
        assert_eq!(config.output, OutputFormat::Nested);
        assert_eq!(config.workflows_dir, Some(PathBuf::from("/srv/workflows")));
    }

    #[test]
    fn test_output_format_round_trip() {
        for format in [OutputFormat::Yaml, OutputFormat::Json, OutputFormat::Nested] {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
