//! The Upload, Rewrite and Generate steps applied to a workflow context.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::audio::{AssembledAudio, Ffmpeg, OutputPlan, assemble};
use crate::config::{RewriteSettings, SpeechSettings};
use crate::error::NarrateError;
use crate::extract::{self, Extraction};
use crate::progress::ProgressSink;
use crate::rewrite::{RewriteReport, Rewriter, rewrite_chunks};
use crate::session::WorkflowContext;
use crate::text::cleaner::clean_for_speech;
use crate::tts::{SpeechSynthesizer, SynthesisOptions, TtsOptions, synthesize_chunks};

/// Result of loading files into the context.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Same files as the current context; nothing was re-read
    Unchanged,
    /// New text loaded
    Loaded(Extraction),
}

/// Load documents as the new source text.
///
/// Uploading the same file list again keeps the current context unless
/// `force` is set. When no text could be extracted the context is left
/// untouched.
pub fn upload_files(
    context: &mut WorkflowContext,
    paths: &[PathBuf],
    force: bool,
) -> Result<UploadOutcome> {
    let sources: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    if !force && context.has_sources(&sources) && !context.original_text.is_empty() {
        return Ok(UploadOutcome::Unchanged);
    }

    let extraction = extract::extract_files(paths);
    if extraction.text.trim().is_empty() {
        return Err(NarrateError::NoSourceText.into());
    }

    context.replace_source(sources, extraction.text.clone());
    Ok(UploadOutcome::Loaded(extraction))
}

/// Load a web article as the new source text.
pub async fn fetch_url(context: &mut WorkflowContext, url: &str) -> Result<()> {
    let text = extract::fetch_article(url).await?;
    if text.trim().is_empty() {
        return Err(NarrateError::NoSourceText.into());
    }

    context.replace_source(vec![url.to_string()], text);
    Ok(())
}

/// Step 2: rewrite the source text and store the result.
pub async fn rewrite_source(
    context: &mut WorkflowContext,
    settings: &RewriteSettings,
    rewriter: &dyn Rewriter,
    sink: &mut dyn ProgressSink,
) -> Result<RewriteReport> {
    if context.original_text.trim().is_empty() {
        return Err(NarrateError::NoSourceText.into());
    }

    let strategy = settings.chunking.build()?;
    let chunks = strategy.chunk(&context.original_text);
    log::info!("rewriting {} chunk(s), {}", chunks.len(), strategy.describe());

    let result = rewrite_chunks(
        &chunks,
        rewriter,
        settings.on_failure,
        settings.concurrency,
        sink,
    )
    .await;
    sink.finish();

    let report = result?;
    context.record_rewrite(report.text.clone())?;
    Ok(report)
}

/// Step 3: synthesize the rewritten text and write the narration file.
///
/// The output path and encoder are checked before any chunk is sent to the
/// synthesizer.
pub async fn generate_audio(
    context: &mut WorkflowContext,
    settings: &SpeechSettings,
    synthesizer: &dyn SpeechSynthesizer,
    options: &TtsOptions,
    output: Option<&Path>,
    ffmpeg: &Ffmpeg,
    sink: &mut dyn ProgressSink,
) -> Result<AssembledAudio> {
    if context.rewritten_text.trim().is_empty() {
        return Err(NarrateError::NotRewritten.into());
    }

    let plan = OutputPlan::resolve(output, ffmpeg)?;

    let cleaned = clean_for_speech(&context.rewritten_text);
    let strategy = settings.chunking.build()?;
    let chunks = strategy.chunk(&cleaned);
    log::info!(
        "synthesizing {} chunk(s) with {}, {}",
        chunks.len(),
        synthesizer.name(),
        strategy.describe()
    );

    let synthesis = SynthesisOptions {
        storyteller: settings.storyteller,
        concurrency: settings.concurrency,
    };
    let result = synthesize_chunks(&chunks, synthesizer, options, synthesis, sink).await;
    sink.finish();

    let segments = result?;
    let assembled = assemble(&segments, settings.pause_ms, &plan, ffmpeg)?;
    context.record_audio(assembled.path.clone())?;
    Ok(assembled)
}
