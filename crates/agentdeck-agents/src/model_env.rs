//! Model configuration to provider environment mapping.
//!
//! The settings store supplies one model configuration; each agent reads it
//! through different environment variable names. The mapping is an explicit
//! per-agent table. Configured model names pass through unmodified -
//! nothing is guessed or substituted - and absent fields are omitted rather
//! than exported as empty values that could override an agent's own
//! defaults.

/// Model configuration supplied by the settings store.
#[derive(Debug, Clone, Default)]
pub struct ModelConfig {
    pub default_model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ModelConfig {
    /// True when a non-empty api key is configured.
    pub fn has_api_key(&self) -> bool {
        present(&self.api_key).is_some()
    }

    /// The configured model name, if any.
    pub fn model_name(&self) -> Option<&str> {
        present(&self.default_model)
    }
}

/// Which environment variables an agent reads provider config through.
struct ProviderEnv {
    model: Option<&'static str>,
    api_key: Option<&'static str>,
    base_url: Option<&'static str>,
}

fn provider_env(agent: &str) -> ProviderEnv {
    match agent {
        "claude" => ProviderEnv {
            model: Some("ANTHROPIC_MODEL"),
            api_key: None,
            base_url: None,
        },
        "gemini" => ProviderEnv {
            model: Some("GEMINI_MODEL"),
            api_key: Some("GOOGLE_API_KEY"),
            base_url: None,
        },
        "aider" => ProviderEnv {
            model: Some("AIDER_MODEL"),
            api_key: Some("OPENAI_API_KEY"),
            base_url: Some("OPENAI_API_BASE"),
        },
        "codex" => ProviderEnv {
            model: Some("OPENAI_MODEL"),
            api_key: Some("OPENAI_API_KEY"),
            base_url: Some("OPENAI_API_BASE"),
        },
        "qwen" => ProviderEnv {
            model: Some("QWEN_MODEL"),
            api_key: Some("DASHSCOPE_API_KEY"),
            base_url: None,
        },
        // Plain shells and unknown kinds get no provider config
        _ => ProviderEnv {
            model: None,
            api_key: None,
            base_url: None,
        },
    }
}

/// Build the provider environment variables for `agent` from `config`.
pub fn model_env(agent: &str, config: &ModelConfig) -> Vec<(String, String)> {
    let table = provider_env(agent);
    let mut env = Vec::new();

    if let (Some(var), Some(model)) = (table.model, present(&config.default_model)) {
        env.push((var.to_string(), model.to_string()));
    }
    if let (Some(var), Some(key)) = (table.api_key, present(&config.api_key)) {
        env.push((var.to_string(), key.to_string()));
    }
    if let (Some(var), Some(url)) = (table.base_url, present(&config.base_url)) {
        env.push((var.to_string(), url.to_string()));
    }

    env
}

/// Treat empty strings in the settings file the same as absent fields.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
