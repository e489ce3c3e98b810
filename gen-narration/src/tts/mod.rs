//! Speech synthesis backends and the synthesis stage.

pub mod google;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::audio::AudioSegment;
use crate::error::NarrateError;
use crate::progress::ProgressSink;
use crate::stage::{StageOptions, run_chunks};
use crate::text::TextChunk;
use crate::text::cleaner::apply_storyteller_pacing;

/// Voice and language selection for one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsOptions {
    /// Language code, e.g. "en" or "fr"
    pub language: String,
    /// Regional domain for accents, e.g. "co.uk" or "com.au"
    pub region: Option<String>,
    /// Named voice for backends that have them
    pub voice: Option<String>,
    /// Slower speech
    pub slow: bool,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            region: None,
            voice: None,
            slow: false,
        }
    }
}

impl TtsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_slow(mut self, slow: bool) -> Self {
        self.slow = slow;
        self
    }
}

/// A text-to-speech engine. Returns encoded audio (MP3 or WAV) for one chunk.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, options: &TtsOptions) -> Result<Vec<u8>>;

    fn name(&self) -> &'static str;
}

/// Split text on word boundaries into pieces of at most `max_chars`
/// characters. Words longer than that are cut at character boundaries.
pub(crate) fn split_for_request(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            pieces.extend(hard_split(word, max_chars));
        } else if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            pieces.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Hard split text at exact character positions.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Which speech service to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    /// Google Translate text-to-speech
    #[default]
    Google,
    /// OpenAI-compatible /audio/speech endpoint
    #[value(name = "openai")]
    OpenAi,
}

/// Connection settings for building a backend.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub backend: SpeechBackend,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Create a speech backend.
pub fn create_backend(settings: &BackendSettings) -> Result<Box<dyn SpeechSynthesizer>> {
    match settings.backend {
        SpeechBackend::Google => Ok(Box::new(google::GoogleTranslateTts::new()?)),
        SpeechBackend::OpenAi => {
            let api_key = settings
                .api_key
                .clone()
                .or_else(|| std::env::var(openai::API_KEY_ENV).ok())
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "OpenAI speech needs an API key. Set {} or add it to the llm config.",
                        openai::API_KEY_ENV
                    )
                })?;
            let base_url = settings
                .openai_base_url
                .as_deref()
                .unwrap_or(openai::OPENAI_BASE_URL);
            Ok(Box::new(openai::OpenAiSpeech::new(
                base_url,
                &settings.openai_model,
                api_key,
            )?))
        }
    }
}

/// How the synthesis stage treats each chunk.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisOptions {
    /// Apply storyteller pacing before sending each chunk
    pub storyteller: bool,
    pub concurrency: usize,
}

/// Synthesize every chunk and decode the result.
///
/// A chunk whose request fails or whose audio cannot be decoded is reported
/// and omitted. Returns the decoded segments in chunk order; fails only when
/// no chunk produced audio.
pub async fn synthesize_chunks(
    chunks: &[TextChunk],
    synthesizer: &dyn SpeechSynthesizer,
    options: &TtsOptions,
    synthesis: SynthesisOptions,
    sink: &mut dyn ProgressSink,
) -> crate::error::Result<Vec<AudioSegment>> {
    if chunks.is_empty() {
        return Err(NarrateError::NoAudioProduced);
    }

    let stage = StageOptions {
        label: "Generating audio for",
        concurrency: synthesis.concurrency,
        abort_on_failure: false,
    };

    let results = run_chunks(chunks, stage, sink, |chunk| async move {
        let text = if synthesis.storyteller {
            apply_storyteller_pacing(&chunk.text)
        } else {
            chunk.text.clone()
        };
        log::debug!(
            "{}: synthesizing chunk {} ({} chars)",
            synthesizer.name(),
            chunk.index + 1,
            text.chars().count()
        );
        let bytes = synthesizer.synthesize(&text, options).await?;
        Ok::<_, anyhow::Error>(AudioSegment::decode(&bytes)?)
    })
    .await?;

    let total = results.len();
    let segments: Vec<AudioSegment> = results
        .into_iter()
        .filter_map(|(_, result)| result.ok())
        .collect();

    if segments.is_empty() {
        return Err(NarrateError::StageFailed {
            stage: "Speech synthesis",
            failed: total,
        });
    }

    Ok(segments)
}
