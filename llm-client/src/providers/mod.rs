//! LLM provider implementations

pub mod mock;
mod openai_compatible;

pub use mock::MockProvider;
pub use openai_compatible::OpenAICompatibleProvider;

use crate::config::{ModelPreset, ProviderConfig};
use crate::error::{LlmError, Result};
use crate::provider::LlmProvider;

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Groq,
    OpenAi,
    OpenRouter,
    /// Any OpenAI-compatible server; requires `base_url` in the provider config
    Compatible,
}

impl ProviderKind {
    /// Parse provider kind from string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" | "open-ai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "compatible" | "openai-compatible" | "local" => Ok(Self::Compatible),
            _ => Err(LlmError::ConfigError(format!("Unknown provider: {}", s))),
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("GROQ_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::Compatible => None,
        }
    }

    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Groq => "Groq",
            Self::OpenAi => "OpenAI",
            Self::OpenRouter => "OpenRouter",
            Self::Compatible => "OpenAI-compatible",
        }
    }
}

/// Create a provider instance from a preset and optional config
pub fn get_provider(
    preset: &ModelPreset,
    provider_config: Option<&ProviderConfig>,
) -> Result<Box<dyn LlmProvider>> {
    let kind = ProviderKind::parse(&preset.provider)?;
    let base_url = provider_config.and_then(|c| c.base_url.as_deref());

    let provider = match (kind, base_url) {
        (ProviderKind::Compatible, None) => {
            return Err(LlmError::ConfigError(format!(
                "Provider '{}' needs a base_url in its provider config",
                preset.provider
            )));
        }
        (ProviderKind::Compatible, Some(url)) => {
            let api_key = provider_config.and_then(|c| c.api_key.clone());
            OpenAICompatibleProvider::new(&preset.model, url, api_key, kind.display_name())?
        }
        (kind, Some(url)) => {
            let api_key = get_api_key(provider_config, kind)?;
            OpenAICompatibleProvider::new(&preset.model, url, Some(api_key), kind.display_name())?
        }
        (ProviderKind::Groq, None) => {
            OpenAICompatibleProvider::groq(&preset.model, get_api_key(provider_config, kind)?)?
        }
        (ProviderKind::OpenAi, None) => {
            OpenAICompatibleProvider::openai(&preset.model, get_api_key(provider_config, kind)?)?
        }
        (ProviderKind::OpenRouter, None) => OpenAICompatibleProvider::openrouter(
            &preset.model,
            get_api_key(provider_config, kind)?,
        )?,
    };

    Ok(Box::new(provider))
}

/// Get API key from config or environment variable
fn get_api_key(config: Option<&ProviderConfig>, kind: ProviderKind) -> Result<String> {
    // Check config first
    if let Some(key) = config.and_then(|c| c.api_key.clone()) {
        return Ok(key);
    }

    let env_var = kind.env_var().unwrap_or_default();
    std::env::var(env_var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| LlmError::MissingApiKey {
            provider: kind.display_name().to_string(),
            env_var: env_var.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(provider: &str) -> ModelPreset {
        ModelPreset {
            provider: provider.to_string(),
            model: "some-model".to_string(),
        }
    }

    #[test]
    fn test_parse_provider_kind() {
        assert_eq!(ProviderKind::parse("Groq").unwrap(), ProviderKind::Groq);
        assert_eq!(ProviderKind::parse("openai").unwrap(), ProviderKind::OpenAi);
        assert_eq!(
            ProviderKind::parse("local").unwrap(),
            ProviderKind::Compatible
        );
        assert!(ProviderKind::parse("claude-cli").is_err());
    }

    #[test]
    fn test_api_key_from_config() {
        let config = ProviderConfig {
            api_key: Some("from-config".to_string()),
            base_url: None,
        };
        let provider = get_provider(&preset("groq"), Some(&config)).unwrap();
        assert_eq!(provider.name(), "Groq");
        assert_eq!(provider.model(), "some-model");
    }

    #[test]
    fn test_compatible_requires_base_url() {
        let result = get_provider(&preset("compatible"), None);
        assert!(matches!(result, Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn test_compatible_without_key() {
        let config = ProviderConfig {
            api_key: None,
            base_url: Some("http://localhost:11434/v1".to_string()),
        };
        let provider = get_provider(&preset("compatible"), Some(&config)).unwrap();
        assert_eq!(provider.name(), "OpenAI-compatible");
    }
}
