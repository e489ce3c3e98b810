//! Sentence splitting on terminal punctuation.

use std::iter::FusedIterator;

/// Lazy iterator over the sentences of a text.
///
/// A sentence ends right after `.`, `!` or `?` when the next character is
/// whitespace. The whitespace between sentences is dropped. Abbreviations
/// ("Dr. Smith") and decimals are not special-cased.
#[derive(Debug, Clone)]
pub struct Sentences<'a> {
    rest: &'a str,
}

impl<'a> Sentences<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { rest: text.trim() }
    }
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        let mut after_terminal = false;
        for (i, c) in self.rest.char_indices() {
            if after_terminal && c.is_whitespace() {
                let sentence = &self.rest[..i];
                self.rest = self.rest[i..].trim_start();
                return Some(sentence);
            }
            after_terminal = matches!(c, '.' | '!' | '?');
        }

        Some(std::mem::take(&mut self.rest))
    }
}

impl FusedIterator for Sentences<'_> {}

/// Split text into sentences.
pub fn split_into_sentences(text: &str) -> Sentences<'_> {
    Sentences::new(text)
}
