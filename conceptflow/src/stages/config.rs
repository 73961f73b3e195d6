//! Per-stage configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::core::PipelineStage;
use crate::errors::ConfigError;

/// Language preset used by the text processing stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// German.
    De,
}

impl Language {
    /// Returns the language code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "de" | "german" => Ok(Self::De),
            other => Err(ConfigError::new(format!("unsupported language '{other}'"))
                .with_option("language")),
        }
    }
}

/// Structured options for one stage.
///
/// Options are kept as a JSON object. Each stage contract decides which
/// keys it recognizes and rejects the rest before anything runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Language preset for the stage. Unset means the orchestrator default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,

    /// Stage-specific options.
    #[serde(default, flatten)]
    pub options: Map<String, Value>,
}

impl StageConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the language preset.
    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Fills in the language preset if none was set.
    #[must_use]
    pub fn or_language(mut self, language: Language) -> Self {
        self.language.get_or_insert(language);
        self
    }

    /// Returns the language preset, falling back to English.
    #[must_use]
    pub fn language(&self) -> Language {
        self.language.unwrap_or_default()
    }

    /// Sets an option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Returns an option value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Returns true if no options are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Parses a configuration from a JSON object.
    ///
    /// The optional `language` key selects the preset; every other key is
    /// a stage option.
    pub fn from_value(stage: PipelineStage, value: Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::new(format!(
                "configuration for stage '{stage}' must be a JSON object"
            ))
            .for_stage(stage));
        }
        serde_json::from_value(value)
            .map_err(|e| ConfigError::new(e.to_string()).for_stage(stage))
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json_str(stage: PipelineStage, json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ConfigError::new(e.to_string()).for_stage(stage))?;
        Self::from_value(stage, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_language_parsing() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!("german".parse::<Language>().unwrap(), Language::De);

        let err = "fr".parse::<Language>().unwrap_err();
        assert_eq!(err.option.as_deref(), Some("language"));
    }

    #[test]
    fn test_config_builder() {
        let config = StageConfig::new()
            .with_language(Language::De)
            .with_option("n_neighbors", json!(20));

        assert_eq!(config.language, Some(Language::De));
        assert_eq!(config.get("n_neighbors"), Some(&json!(20)));
        assert!(!config.is_empty());
    }

    #[test]
    fn test_config_from_json_splits_language() {
        let config = StageConfig::from_json_str(
            PipelineStage::Clustering,
            r#"{"language": "de", "algorithm": "kmeans", "clusters": 12}"#,
        )
        .unwrap();

        assert_eq!(config.language, Some(Language::De));
        assert_eq!(config.options.len(), 2);
        assert!(config.get("language").is_none());
    }

    #[test]
    fn test_unset_language_takes_default() {
        let config = StageConfig::new().with_option("clusters", json!(8));
        assert_eq!(config.language, None);
        assert_eq!(config.language(), Language::En);

        let filled = config.or_language(Language::De);
        assert_eq!(filled.language(), Language::De);

        let explicit = StageConfig::new()
            .with_language(Language::En)
            .or_language(Language::De);
        assert_eq!(explicit.language(), Language::En);

        let parsed = StageConfig::from_json_str(PipelineStage::Data, r#"{"x": 1}"#).unwrap();
        assert_eq!(parsed.language, None);
    }

    #[test]
    fn test_config_rejects_non_object() {
        let err = StageConfig::from_value(PipelineStage::Graph, json!([1, 2])).unwrap_err();
        assert_eq!(err.stage, Some(PipelineStage::Graph));

        let err = StageConfig::from_json_str(PipelineStage::Data, "{").unwrap_err();
        assert_eq!(err.stage, Some(PipelineStage::Data));
    }
}
