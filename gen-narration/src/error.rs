//! Typed errors for the narration pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NarrateError {
    #[error("No source text available. Upload a document or fetch an article first.")]
    NoSourceText,

    #[error("Text has not been rewritten yet. Run the rewrite step first.")]
    NotRewritten,

    #[error("{stage} produced no output: all {failed} chunk(s) failed")]
    StageFailed { stage: &'static str, failed: usize },

    #[error("{stage} aborted at chunk {}: {message}", .index + 1)]
    ChunkAborted {
        stage: &'static str,
        /// Zero-based chunk index
        index: usize,
        message: String,
    },

    #[error("No audio generated")]
    NoAudioProduced,

    #[error("Invalid chunking settings: {0}")]
    InvalidChunking(String),

    #[error("Could not decode audio: {0}")]
    AudioDecode(String),

    #[error("Could not encode audio: {0}")]
    AudioEncode(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NarrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failed_message() {
        let err = NarrateError::StageFailed {
            stage: "Rewrite",
            failed: 3,
        };
        assert_eq!(err.to_string(), "Rewrite produced no output: all 3 chunk(s) failed");
    }

    #[test]
    fn test_chunk_aborted_counts_from_one() {
        let err = NarrateError::ChunkAborted {
            stage: "Rewriting",
            index: 1,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "Rewriting aborted at chunk 2: rate limited");
    }
}
