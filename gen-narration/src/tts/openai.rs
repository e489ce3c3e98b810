//! OpenAI-compatible `/audio/speech` backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{SpeechSynthesizer, TtsOptions, split_for_request};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_MODEL: &str = "tts-1";
pub const DEFAULT_VOICE: &str = "alloy";

/// Longest `input` the endpoint accepts.
pub const MAX_INPUT_CHARS: usize = 4096;

const SLOW_SPEED: f32 = 0.8;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
}

pub struct OpenAiSpeech {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiSpeech {
    pub fn new(base_url: &str, model: &str, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let model = if model.trim().is_empty() {
            DEFAULT_MODEL
        } else {
            model
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    fn build_request<'a>(&'a self, text: &'a str, options: &'a TtsOptions) -> SpeechRequest<'a> {
        SpeechRequest {
            model: &self.model,
            input: text,
            voice: options.voice.as_deref().unwrap_or(DEFAULT_VOICE),
            response_format: "mp3",
            speed: options.slow.then_some(SLOW_SPEED),
        }
    }

    /// Pieces of `text` that each fit in one request. Pacing can push a
    /// chunk past the limit, so longer text is cut on word boundaries.
    fn request_pieces(text: &str) -> Vec<String> {
        if text.chars().count() <= MAX_INPUT_CHARS {
            vec![text.to_string()]
        } else {
            split_for_request(text, MAX_INPUT_CHARS)
        }
    }

    async fn request_audio(&self, text: &str, options: &TtsOptions) -> Result<Vec<u8>> {
        let url = format!("{}/audio/speech", self.base_url);
        let body = self.build_request(text, options);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach speech endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Speech endpoint returned {}: {}", status, detail.trim());
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read speech response")?;
        if bytes.is_empty() {
            anyhow::bail!("Speech endpoint returned no audio");
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str, options: &TtsOptions) -> Result<Vec<u8>> {
        let pieces = Self::request_pieces(text);
        if pieces.len() > 1 {
            log::debug!("splitting {} chars into {} requests", text.chars().count(), pieces.len());
        }

        let mut audio = Vec::new();
        for piece in &pieces {
            audio.extend(self.request_audio(piece, options).await?);
        }
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
