use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use agentdeck_agents::ModelConfig;

/// Application settings, read from a JSON settings file.
///
/// The settings store itself (editing, masking, test endpoints) lives
/// outside this service; agentdeck only consumes the model configuration
/// block to derive agent environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai: ProviderSettings,
}

/// OpenAI-compatible provider block of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Settings {
    /// Load settings from `path`, falling back to defaults on a missing or
    /// unreadable file. A corrupt settings file must never prevent the
    /// server from starting.
    pub fn load(path: &Path) -> Settings {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
            Err(e) => {
                warn!(path = %path.display(), "failed to read settings file: {}", e);
                return Settings::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), "failed to parse settings file: {}", e);
                Settings::default()
            }
        }
    }

    /// Model configuration handed to the agent environment tables.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            default_model: self.openai.model.clone(),
            api_key: self.openai.api_key.clone(),
            base_url: self.openai.base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/settings.json"));
        assert!(settings.openai.model.is_none());
        assert!(!settings.model_config().has_api_key());
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let settings = Settings::load(file.path());
        assert!(settings.openai.api_key.is_none());
    }

    #[test]
    fn parses_model_block() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"openai": {{"model": "gpt-4o", "api_key": "sk-test", "base_url": "http://localhost:11434/v1"}}}}"#
        )
        .unwrap();

        let config = Settings::load(file.path()).model_config();
        assert_eq!(config.model_name(), Some("gpt-4o"));
        assert!(config.has_api_key());
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:11434/v1"));
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"huggingface": {{"token": "hf_x"}}, "openai": {{"model": "m"}}}}"#
        )
        .unwrap();
        let settings = Settings::load(file.path());
        assert_eq!(settings.openai.model.as_deref(), Some("m"));
    }
}
