//! Text processing: sentence splitting, chunking strategies and cleanup for speech.

pub mod chunker;
pub mod cleaner;
pub mod sentences;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use chunker::{DEFAULT_OVERLAP, OverlapChunker, SentenceChunker};

/// A chunk of text submitted to an external rewriting or speech service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk in the input order
    pub index: usize,
    /// The text content
    pub text: String,
}

impl TextChunk {
    /// Create a new text chunk.
    pub fn new(index: usize, text: String) -> Self {
        Self { index, text }
    }
}

/// A way of cutting text into bounded chunks.
pub trait ChunkStrategy: Send + Sync {
    /// Split text into chunk strings, in order.
    fn split(&self, text: &str) -> Vec<String>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Split text into indexed chunks.
    fn chunk(&self, text: &str) -> Vec<TextChunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextChunk::new(index, text))
            .collect()
    }
}

/// Chunking settings as they appear in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum ChunkingConfig {
    /// Pack whole sentences up to `max_len` characters
    Sentences { max_len: usize },
    /// Fixed windows of `size` characters sharing `overlap` characters
    Overlap {
        size: usize,
        #[serde(default = "default_overlap")]
        overlap: usize,
    },
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

impl ChunkingConfig {
    /// Build the strategy these settings describe.
    pub fn build(&self) -> Result<Box<dyn ChunkStrategy>> {
        match *self {
            Self::Sentences { max_len } => Ok(Box::new(SentenceChunker::new(max_len)?)),
            Self::Overlap { size, overlap } => Ok(Box::new(OverlapChunker::new(size, overlap)?)),
        }
    }
}
