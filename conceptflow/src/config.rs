//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;
use crate::pipeline::DEFAULT_MAX_CONCURRENT_PIPELINES;
use crate::stages::Language;
use crate::utils::validate_process_name;

/// Configuration of an [`Orchestrator`](crate::orchestrator::Orchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Root directory of the filesystem artifact store.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    /// Process name used when a request names none.
    #[serde(default = "default_process")]
    pub default_process: String,
    /// Maximum number of pipelines executing at the same time.
    #[serde(default = "default_max_concurrent_pipelines")]
    pub max_concurrent_pipelines: usize,
    /// Per-stage timeout in seconds. No timeout when unset.
    #[serde(default)]
    pub stage_timeout_seconds: Option<f64>,
    /// Rebuild the registry from stored artifacts on open.
    #[serde(default = "default_rehydrate_on_start")]
    pub rehydrate_on_start: bool,
    /// Language preset for stages the request does not configure.
    #[serde(default)]
    pub language: Language,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_process() -> String {
    "default".to_string()
}

fn default_max_concurrent_pipelines() -> usize {
    DEFAULT_MAX_CONCURRENT_PIPELINES
}

fn default_rehydrate_on_start() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            default_process: default_process(),
            max_concurrent_pipelines: default_max_concurrent_pipelines(),
            stage_timeout_seconds: None,
            rehydrate_on_start: default_rehydrate_on_start(),
            language: Language::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage root.
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    /// Sets the default process name.
    #[must_use]
    pub fn with_default_process(mut self, name: impl Into<String>) -> Self {
        self.default_process = name.into();
        self
    }

    /// Sets the concurrency bound.
    #[must_use]
    pub fn with_max_concurrent_pipelines(mut self, max: usize) -> Self {
        self.max_concurrent_pipelines = max;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_seconds = Some(timeout.as_secs_f64());
        self
    }

    /// Sets whether the registry is rehydrated on open.
    #[must_use]
    pub fn with_rehydrate_on_start(mut self, rehydrate: bool) -> Self {
        self.rehydrate_on_start = rehydrate;
        self
    }

    /// Sets the default language preset.
    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Returns the per-stage timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_seconds
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Parses a configuration from JSON and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::new(format!("invalid orchestrator configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file and validates it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::new(format!("cannot read configuration file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Checks the configuration for invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_pipelines == 0 {
            return Err(ConfigError::new("max_concurrent_pipelines must be at least 1")
                .with_option("max_concurrent_pipelines"));
        }
        if let Some(secs) = self.stage_timeout_seconds {
            if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::new(format!(
                    "stage_timeout_seconds must be a positive, representable duration, got {secs}"
                ))
                .with_option("stage_timeout_seconds"));
            }
        }
        validate_process_name(&self.default_process)
            .map_err(|e| e.with_option("default_process"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.storage_root, PathBuf::from("./tmp"));
        assert_eq!(config.default_process, "default");
        assert_eq!(config.max_concurrent_pipelines, 4);
        assert_eq!(config.stage_timeout(), None);
        assert!(config.rehydrate_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = OrchestratorConfig::from_json_str(
            r#"{"storage_root": "/data/concepts", "stage_timeout_seconds": 1.5, "language": "de"}"#,
        )
        .unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/data/concepts"));
        assert_eq!(config.stage_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.language, Language::De);
        assert_eq!(config.default_process, "default");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = OrchestratorConfig::new()
            .with_max_concurrent_pipelines(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.option.as_deref(), Some("max_concurrent_pipelines"));

        let err = OrchestratorConfig::from_json_str(r#"{"stage_timeout_seconds": -1}"#).unwrap_err();
        assert_eq!(err.option.as_deref(), Some("stage_timeout_seconds"));

        let mut huge = OrchestratorConfig::new();
        huge.stage_timeout_seconds = Some(1e300);
        let err = huge.validate().unwrap_err();
        assert_eq!(err.option.as_deref(), Some("stage_timeout_seconds"));
        assert_eq!(huge.stage_timeout(), None);

        let mut nan = OrchestratorConfig::new();
        nan.stage_timeout_seconds = Some(f64::NAN);
        assert!(nan.validate().is_err());
        assert_eq!(nan.stage_timeout(), None);

        let err = OrchestratorConfig::new()
            .with_default_process("../etc")
            .validate()
            .unwrap_err();
        assert_eq!(err.option.as_deref(), Some("default_process"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conceptflow.json");
        std::fs::write(&path, r#"{"default_process": "corpus1", "rehydrate_on_start": false}"#)
            .unwrap();

        let config = OrchestratorConfig::from_file(&path).unwrap();
        assert_eq!(config.default_process, "corpus1");
        assert!(!config.rehydrate_on_start);

        assert!(OrchestratorConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
