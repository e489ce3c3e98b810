//! Chunking strategies for the rewrite and speech stages.

use std::ops::Range;

use super::ChunkStrategy;
use super::sentences::split_into_sentences;
use crate::error::{NarrateError, Result};

/// Default maximum chunk length for the rewrite stage, in characters.
pub const DEFAULT_REWRITE_CHUNK_LEN: usize = 3000;

/// Default maximum chunk length for the speech stage, in characters.
pub const DEFAULT_SPEECH_CHUNK_LEN: usize = 4000;

/// Default overlap between windows in overlap mode, in characters.
pub const DEFAULT_OVERLAP: usize = 200;

/// Greedily packs whole sentences into chunks shorter than `max_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceChunker {
    max_len: usize,
}

impl SentenceChunker {
    pub fn new(max_len: usize) -> Result<Self> {
        if max_len == 0 {
            return Err(NarrateError::InvalidChunking(
                "max_len must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_len })
    }
}

impl ChunkStrategy for SentenceChunker {
    fn split(&self, text: &str) -> Vec<String> {
        pack_sentences(split_into_sentences(text), self.max_len)
    }

    fn describe(&self) -> String {
        format!("sentences (max {} chars)", self.max_len)
    }
}

/// Fixed-size character windows where consecutive windows share `overlap`
/// characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapChunker {
    size: usize,
    overlap: usize,
}

impl OverlapChunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(NarrateError::InvalidChunking(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= size {
            return Err(NarrateError::InvalidChunking(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }
}

impl ChunkStrategy for OverlapChunker {
    fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, so windows never cut a code point
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        overlap_windows(char_len, self.size, self.overlap)
            .into_iter()
            .map(|w| text[boundaries[w.start]..boundaries[w.end]].to_string())
            .collect()
    }

    fn describe(&self) -> String {
        format!("overlap windows ({} chars, {} overlap)", self.size, self.overlap)
    }
}

/// Pack sentences into chunks.
///
/// Sentences are joined with a single space. A sentence that would make the
/// running chunk reach `max_len` starts a new chunk; a sentence that alone
/// reaches `max_len` is kept whole as its own chunk.
pub fn pack_sentences<'a, I>(sentences: I, max_len: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in sentences {
        let sentence_len = sentence.chars().count();

        if current.is_empty() {
            current.push_str(sentence);
            current_len = sentence_len;
        } else if current_len + 1 + sentence_len < max_len {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + sentence_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = sentence_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Compute overlap windows over `len` characters.
///
/// Windows are `[start, start + size)` clipped to `len`; the next window
/// starts at `end - overlap`. Stops once a window reaches the end.
/// Callers guarantee `overlap < size`.
pub fn overlap_windows(len: usize, size: usize, overlap: usize) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    let mut start = 0;

    while start < len {
        let end = (start + size).min(len);
        windows.push(start..end);
        if end >= len {
            break;
        }
        start = end - overlap;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_chunk_short_text() {
        let chunker = SentenceChunker::new(280).unwrap();
        let chunks = chunker.split("Hello world. How are you?");
        assert_eq!(chunks, vec!["Hello world. How are you?"]);
    }

    #[test]
    fn test_chunk_empty_text() {
        let chunker = SentenceChunker::new(280).unwrap();
        assert!(chunker.split("").is_empty());
        assert!(chunker.split("   \n\n   ").is_empty());
    }

    #[test]
    fn test_chunk_boundary_is_exclusive() {
        // "aaaa. bbbb." is 11 chars: with max 11 it must be split, with 12 it fits.
        let text = "aaaa. bbbb.";
        assert_eq!(
            SentenceChunker::new(11).unwrap().split(text),
            vec!["aaaa.", "bbbb."]
        );
        assert_eq!(SentenceChunker::new(12).unwrap().split(text), vec![text]);
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let long = "This sentence is far longer than the tiny limit we configured.";
        let text = format!("Short. {} Tail.", long);
        let chunks = SentenceChunker::new(20).unwrap().split(&text);
        assert_eq!(chunks, vec!["Short.", long, "Tail."]);
    }

    #[test]
    fn test_oversized_first_sentence_emits_no_empty_chunk() {
        let chunks = SentenceChunker::new(5).unwrap().split("Much too long. Ok.");
        assert_eq!(chunks, vec!["Much too long.", "Ok."]);
    }

    #[test]
    fn test_chunk_indices_follow_order() {
        let chunks = SentenceChunker::new(10)
            .unwrap()
            .chunk("First one. Second one. Third one.");
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        assert_eq!(chunks[2].text, "Third one.");
    }

    #[test]
    fn test_zero_max_len_rejected() {
        assert!(SentenceChunker::new(0).is_err());
    }

    #[test]
    fn test_overlap_windows_reference_case() {
        let windows = overlap_windows(10_000, 3000, 200);
        assert_eq!(windows, vec![0..3000, 2800..5800, 5600..8600, 8400..10_000]);
    }

    #[test]
    fn test_overlap_windows_short_text() {
        assert_eq!(overlap_windows(50, 3000, 200), vec![0..50]);
        assert!(overlap_windows(0, 3000, 200).is_empty());
    }

    #[test]
    fn test_overlap_windows_exact_fit() {
        assert_eq!(overlap_windows(3000, 3000, 200), vec![0..3000]);
    }

    #[test]
    fn test_overlap_chunker_duplicates_overlap() {
        let chunker = OverlapChunker::new(4, 1).unwrap();
        assert_eq!(chunker.split("abcdefghij"), vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_overlap_chunker_respects_char_boundaries() {
        let chunker = OverlapChunker::new(3, 1).unwrap();
        assert_eq!(chunker.split("héllo wörld"), vec!["hél", "llo", "o w", "wör", "rld"]);
    }

    #[test]
    fn test_overlap_chunker_rejects_bad_settings() {
        assert!(OverlapChunker::new(0, 0).is_err());
        assert!(OverlapChunker::new(200, 200).is_err());
        assert!(OverlapChunker::new(100, 300).is_err());
    }

    fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    proptest! {
        #[test]
        fn prop_chunks_shorter_than_limit_unless_single_sentence(
            text in "[a-zA-Z ,.!?\n]{0,400}",
            max_len in 5usize..80,
        ) {
            let chunks = SentenceChunker::new(max_len).unwrap().split(&text);
            for chunk in &chunks {
                prop_assert!(!chunk.is_empty());
                if chunk.chars().count() >= max_len {
                    prop_assert_eq!(split_into_sentences(chunk).count(), 1);
                }
            }
        }

        #[test]
        fn prop_rejoined_chunks_match_input(
            text in "[a-zA-Z ,.!?\n]{0,400}",
            max_len in 1usize..80,
        ) {
            let chunks = SentenceChunker::new(max_len).unwrap().split(&text);
            prop_assert_eq!(collapse_whitespace(&chunks.join(" ")), collapse_whitespace(&text));
        }

        #[test]
        fn prop_overlap_windows_reconstruct_text(
            text in "[a-zA-Zéü .!?]{1,500}",
            size in 2usize..60,
            overlap_seed in 0usize..60,
        ) {
            prop_assume!(!text.trim().is_empty());
            let overlap = overlap_seed % size;
            let chunks = OverlapChunker::new(size, overlap).unwrap().split(&text);

            let mut rebuilt = String::new();
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert!(chunk.chars().count() <= size);
                let skip = if i == 0 { 0 } else { overlap };
                rebuilt.extend(chunk.chars().skip(skip));
            }
            prop_assert_eq!(rebuilt, text);
        }
    }
}
