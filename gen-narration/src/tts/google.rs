//! Google Translate text-to-speech.
//!
//! The endpoint accepts at most ~100 characters per request, so each chunk is
//! split on word boundaries and the returned MP3 frames are concatenated.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{SpeechSynthesizer, TtsOptions, split_for_request};

/// Longest text sent in a single request.
pub const MAX_REQUEST_CHARS: usize = 100;

const DEFAULT_REGION: &str = "com";

pub struct GoogleTranslateTts {
    client: Client,
}

impl GoogleTranslateTts {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    fn endpoint(options: &TtsOptions) -> String {
        let region = options.region.as_deref().unwrap_or(DEFAULT_REGION);
        format!("https://translate.google.{}/translate_tts", region)
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, options: &TtsOptions) -> Result<Vec<u8>> {
        let endpoint = Self::endpoint(options);
        let speed = if options.slow { "0.3" } else { "1" };
        let pieces = split_for_request(text, MAX_REQUEST_CHARS);
        let total = pieces.len().to_string();

        let mut audio = Vec::new();
        for (i, piece) in pieces.iter().enumerate() {
            let idx = i.to_string();
            let textlen = piece.chars().count().to_string();
            let response = self
                .client
                .get(&endpoint)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", options.language.as_str()),
                    ("ttsspeed", speed),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                    ("q", piece.as_str()),
                ])
                .send()
                .await
                .context("Failed to reach Google TTS")?;

            let status = response.status();
            if !status.is_success() {
                anyhow::bail!("Google TTS returned status {}", status);
            }

            let bytes = response
                .bytes()
                .await
                .context("Failed to read Google TTS response")?;
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            anyhow::bail!("Google TTS returned no audio");
        }

        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}
