//! Rewriting source text into a storytelling tone, chunk by chunk.

use async_trait::async_trait;
use clap::ValueEnum;
use llm_client::{LlmProvider, LlmRequest};
use serde::{Deserialize, Serialize};

use crate::error::{NarrateError, Result};
use crate::progress::ProgressSink;
use crate::stage::{StageOptions, run_chunks};
use crate::text::TextChunk;

/// Default instruction sent with every chunk.
pub const STORYTELLER_PROMPT: &str =
    "You are an expert audiobook scriptwriter. Rewrite the text in a storytelling tone.";

/// Sampling temperature for rewrite and chat requests.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Turns one chunk of text into its rewritten form.
#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(&self, chunk: &str) -> anyhow::Result<String>;
}

/// Rewriter backed by a chat-completion provider.
pub struct LlmRewriter {
    provider: Box<dyn LlmProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmRewriter {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self {
            provider,
            system_prompt: STORYTELLER_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Name and model of the underlying provider, for status output.
    pub fn describe(&self) -> String {
        format!("{} ({})", self.provider.name(), self.provider.model())
    }
}

#[async_trait]
impl Rewriter for LlmRewriter {
    async fn rewrite(&self, chunk: &str) -> anyhow::Result<String> {
        let request = LlmRequest::prompt(chunk)
            .with_system(&self.system_prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = self.provider.complete(request).await?;
        if let Some(usage) = &response.usage {
            log::debug!(
                "rewrite used {} input + {} output tokens",
                usage.input_tokens,
                usage.output_tokens
            );
        }
        Ok(response.content)
    }
}

/// What a failed chunk contributes to the rewritten text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Contribute an empty string
    #[default]
    Skip,
    /// Contribute the chunk's source text unchanged
    KeepOriginal,
    /// Stop the whole stage at the first failure
    Abort,
}

/// Outcome of a rewrite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Contributions joined in chunk order
    pub text: String,
    pub total_chunks: usize,
    /// Indices of chunks that failed
    pub failed: Vec<usize>,
}

impl RewriteReport {
    pub fn succeeded(&self) -> usize {
        self.total_chunks - self.failed.len()
    }
}

/// Rewrite every chunk and join the contributions in chunk order.
///
/// Each successful rewrite is trimmed; failed chunks contribute according to
/// `policy`. Fails with [`NarrateError::StageFailed`] when no chunk could be
/// rewritten at all.
pub async fn rewrite_chunks(
    chunks: &[TextChunk],
    rewriter: &dyn Rewriter,
    policy: FailurePolicy,
    concurrency: usize,
    sink: &mut dyn ProgressSink,
) -> Result<RewriteReport> {
    if chunks.is_empty() {
        return Err(NarrateError::NoSourceText);
    }

    let options = StageOptions {
        label: "Rewriting",
        concurrency,
        abort_on_failure: policy == FailurePolicy::Abort,
    };

    let results = run_chunks(chunks, options, sink, |chunk| rewriter.rewrite(&chunk.text)).await?;

    let mut contributions = Vec::with_capacity(results.len());
    let mut failed = Vec::new();
    for (chunk, result) in results {
        match result {
            Ok(rewritten) => contributions.push(rewritten.trim().to_string()),
            Err(_) => {
                failed.push(chunk.index);
                contributions.push(match policy {
                    FailurePolicy::KeepOriginal => chunk.text.clone(),
                    FailurePolicy::Skip | FailurePolicy::Abort => String::new(),
                });
            }
        }
    }

    if failed.len() == chunks.len() {
        return Err(NarrateError::StageFailed {
            stage: "Rewrite",
            failed: failed.len(),
        });
    }

    if !failed.is_empty() {
        log::warn!("{} of {} chunks failed to rewrite", failed.len(), chunks.len());
    }

    Ok(RewriteReport {
        text: contributions.join(" "),
        total_chunks: chunks.len(),
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecordingProgress;
    use crate::text::ChunkStrategy;
    use crate::text::chunker::SentenceChunker;
    use llm_client::MockProvider;

    fn chunks(texts: &[&str]) -> Vec<TextChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextChunk::new(i, t.to_string()))
            .collect()
    }

    fn rewriter(provider: MockProvider) -> LlmRewriter {
        LlmRewriter::new(Box::new(provider))
    }

    #[tokio::test]
    async fn test_failed_middle_chunk_contributes_empty_string() {
        let rewriter = rewriter(MockProvider::fails_on_calls(&[1]));
        let mut sink = RecordingProgress::default();

        let report = rewrite_chunks(
            &chunks(&["first", "second", "third"]),
            &rewriter,
            FailurePolicy::Skip,
            1,
            &mut sink,
        )
        .await
        .unwrap();

        assert_eq!(report.text, "FIRST  THIRD");
        assert_eq!(report.failed, vec![1]);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(sink.errors.len(), 1);
        assert_eq!(sink.updates.len(), 3);
        assert_eq!(sink.updates[2], (1.0, "Rewriting chunk 3/3...".to_string()));
    }

    #[tokio::test]
    async fn test_keep_original_policy() {
        let rewriter = rewriter(MockProvider::fails_on_calls(&[1]));
        let mut sink = RecordingProgress::default();

        let report = rewrite_chunks(
            &chunks(&["first", "second", "third"]),
            &rewriter,
            FailurePolicy::KeepOriginal,
            1,
            &mut sink,
        )
        .await
        .unwrap();

        assert_eq!(report.text, "FIRST second THIRD");
    }

    #[tokio::test]
    async fn test_keep_original_with_offset_indices() {
        let rewriter = rewriter(MockProvider::fails_on_calls(&[1]));
        let mut sink = RecordingProgress::default();
        let input = vec![
            TextChunk::new(10, "first".to_string()),
            TextChunk::new(11, "second".to_string()),
            TextChunk::new(12, "third".to_string()),
        ];

        let report = rewrite_chunks(&input, &rewriter, FailurePolicy::KeepOriginal, 1, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.text, "FIRST second THIRD");
        assert_eq!(report.failed, vec![11]);
    }

    #[tokio::test]
    async fn test_abort_policy_stops_stage() {
        let provider = MockProvider::fails_on_calls(&[0]);
        let rewriter = rewriter(provider);
        let mut sink = RecordingProgress::default();

        let result = rewrite_chunks(
            &chunks(&["first", "second"]),
            &rewriter,
            FailurePolicy::Abort,
            1,
            &mut sink,
        )
        .await;

        assert!(matches!(
            result,
            Err(NarrateError::ChunkAborted { index: 0, .. })
        ));
        assert!(sink.updates.is_empty());
    }

    #[tokio::test]
    async fn test_total_failure_is_an_error() {
        let rewriter = rewriter(MockProvider::always_fails("down"));
        let mut sink = RecordingProgress::default();

        let result = rewrite_chunks(
            &chunks(&["a", "b"]),
            &rewriter,
            FailurePolicy::KeepOriginal,
            1,
            &mut sink,
        )
        .await;

        assert!(matches!(
            result,
            Err(NarrateError::StageFailed { failed: 2, .. })
        ));
        assert_eq!(sink.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_contributions_are_trimmed() {
        let rewriter = rewriter(MockProvider::always_succeeds("  Once upon a time.\n\n"));
        let mut sink = RecordingProgress::default();

        let report = rewrite_chunks(&chunks(&["x", "y"]), &rewriter, FailurePolicy::Skip, 1, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.text, "Once upon a time. Once upon a time.");
    }

    #[tokio::test]
    async fn test_no_chunks_is_an_error() {
        let rewriter = rewriter(MockProvider::always_succeeds("x"));
        let mut sink = RecordingProgress::default();
        let result = rewrite_chunks(&[], &rewriter, FailurePolicy::Skip, 1, &mut sink).await;
        assert!(matches!(result, Err(NarrateError::NoSourceText)));
    }

    #[tokio::test]
    async fn test_concurrent_rewrite_preserves_order() {
        let text = "One. Two. Three. Four. Five. Six.";
        let input = SentenceChunker::new(5).unwrap().chunk(text);
        let rewriter = rewriter(MockProvider::from_fn(|request, _| {
            Ok(format!("<{}>", request.last_user_prompt().unwrap_or_default()))
        }));
        let mut sink = RecordingProgress::default();

        let report = rewrite_chunks(&input, &rewriter, FailurePolicy::Skip, 4, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.text, "<One.> <Two.> <Three.> <Four.> <Five.> <Six.>");
    }

    #[tokio::test]
    async fn test_request_carries_storyteller_settings() {
        let rewriter = rewriter(MockProvider::from_fn(|request, _| {
            assert_eq!(request.system_prompt.as_deref(), Some(STORYTELLER_PROMPT));
            assert_eq!(request.temperature, Some(0.7));
            assert_eq!(request.max_tokens, Some(4096));
            Ok("ok".to_string())
        }));

        assert_eq!(rewriter.rewrite("text").await.unwrap(), "ok");
    }

    #[test]
    fn test_failure_policy_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            on_failure: FailurePolicy,
        }
        let parsed: Wrapper = toml::from_str(r#"on_failure = "keep-original""#).unwrap();
        assert_eq!(parsed.on_failure, FailurePolicy::KeepOriginal);
        assert_eq!(FailurePolicy::default(), FailurePolicy::Skip);
    }
}
