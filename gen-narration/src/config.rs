//! narrate configuration: rewrite, speech and chat settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::audio::DEFAULT_PAUSE_MS;
use crate::chat::ASSISTANT_PROMPT;
use crate::rewrite::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, FailurePolicy, STORYTELLER_PROMPT};
use crate::text::ChunkingConfig;
use crate::text::chunker::{DEFAULT_REWRITE_CHUNK_LEN, DEFAULT_SPEECH_CHUNK_LEN};
use crate::tts::{SpeechBackend, TtsOptions, openai};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrateConfig {
    #[serde(default)]
    pub rewrite: RewriteSettings,

    #[serde(default)]
    pub speech: SpeechSettings,

    #[serde(default)]
    pub chat: ChatSettings,

    /// Explicit ffmpeg binary; `ffmpeg` from PATH otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteSettings {
    #[serde(default = "default_rewrite_chunking")]
    pub chunking: ChunkingConfig,

    /// Requests in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub on_failure: FailurePolicy,

    #[serde(default = "default_rewrite_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// LLM preset name; the llm config's task default otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    #[serde(default)]
    pub backend: SpeechBackend,

    /// Language code, e.g. "en"
    #[serde(default = "default_language")]
    pub language: String,

    /// Regional domain for accents, e.g. "co.uk" or "co.in"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Named voice (OpenAI backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(default = "default_true")]
    pub slow: bool,

    /// Add narration pauses to each chunk before synthesis
    #[serde(default = "default_true")]
    pub storyteller: bool,

    #[serde(default = "default_speech_chunking")]
    pub chunking: ChunkingConfig,

    /// Silence after each chunk, in milliseconds
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u32,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_chat_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

fn default_rewrite_chunking() -> ChunkingConfig {
    ChunkingConfig::Sentences {
        max_len: DEFAULT_REWRITE_CHUNK_LEN,
    }
}

fn default_speech_chunking() -> ChunkingConfig {
    ChunkingConfig::Sentences {
        max_len: DEFAULT_SPEECH_CHUNK_LEN,
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_rewrite_prompt() -> String {
    STORYTELLER_PROMPT.to_string()
}

fn default_chat_prompt() -> String {
    ASSISTANT_PROMPT.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_language() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

fn default_pause_ms() -> u32 {
    DEFAULT_PAUSE_MS
}

fn default_openai_model() -> String {
    openai::DEFAULT_MODEL.to_string()
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            chunking: default_rewrite_chunking(),
            concurrency: default_concurrency(),
            on_failure: FailurePolicy::default(),
            system_prompt: default_rewrite_prompt(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            preset: None,
        }
    }
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            backend: SpeechBackend::default(),
            language: default_language(),
            region: None,
            voice: None,
            slow: true,
            storyteller: true,
            chunking: default_speech_chunking(),
            pause_ms: default_pause_ms(),
            concurrency: default_concurrency(),
            openai_model: default_openai_model(),
            openai_base_url: None,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            system_prompt: default_chat_prompt(),
            temperature: default_temperature(),
            preset: None,
        }
    }
}

impl SpeechSettings {
    pub fn tts_options(&self) -> TtsOptions {
        let mut options = TtsOptions::new()
            .with_language(&self.language)
            .with_slow(self.slow);
        if let Some(region) = &self.region {
            options = options.with_region(region);
        }
        if let Some(voice) = &self.voice {
            options = options.with_voice(voice);
        }
        options
    }
}

impl NarrateConfig {
    /// Get the config file path: ~/.config/gen-narration/config.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("gen-narration")
            .join("config.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: NarrateConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }
}
