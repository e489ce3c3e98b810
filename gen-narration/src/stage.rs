//! Driving one pipeline stage over a list of chunks.

use futures_util::stream::{self, StreamExt};
use std::future::Future;

use crate::error::{NarrateError, Result};
use crate::progress::ProgressSink;
use crate::text::TextChunk;

/// How a stage runs its chunks.
#[derive(Debug, Clone, Copy)]
pub struct StageOptions {
    /// Name used in progress labels and errors, e.g. "Rewriting"
    pub label: &'static str,
    /// Maximum number of chunks in flight; 1 means strictly sequential
    pub concurrency: usize,
    /// Stop at the first failed chunk instead of carrying on
    pub abort_on_failure: bool,
}

/// Run `work` over every chunk and return each chunk with its result, in
/// chunk order.
///
/// Each chunk's failure is reported to the sink and kept in the result list;
/// progress is reported after every chunk whether it succeeded or not.
/// With `concurrency > 1` chunks may complete out of order, but the
/// returned list is always sorted by chunk index.
pub async fn run_chunks<'a, T, F, Fut>(
    chunks: &'a [TextChunk],
    options: StageOptions,
    sink: &mut dyn ProgressSink,
    work: F,
) -> Result<Vec<(&'a TextChunk, anyhow::Result<T>)>>
where
    F: Fn(&'a TextChunk) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let total = chunks.len();
    let mut results = Vec::with_capacity(total);

    let mut pending = stream::iter(chunks.iter().map(|chunk| {
        let fut = work(chunk);
        async move { (chunk, fut.await) }
    }))
    .buffer_unordered(options.concurrency.max(1));

    while let Some((chunk, result)) = pending.next().await {
        let index = chunk.index;
        if let Err(e) = &result {
            let message = format!("Error processing chunk {}: {:#}", index + 1, e);
            sink.error(&message);
            if options.abort_on_failure {
                return Err(NarrateError::ChunkAborted {
                    stage: options.label,
                    index,
                    message: format!("{:#}", e),
                });
            }
        } else {
            log::debug!("{} chunk {} done", options.label, index + 1);
        }

        results.push((chunk, result));
        sink.progress(
            results.len() as f64 / total as f64,
            &format!("{} chunk {}/{}...", options.label, results.len(), total),
        );
    }

    results.sort_by_key(|(chunk, _)| chunk.index);
    Ok(results)
}
