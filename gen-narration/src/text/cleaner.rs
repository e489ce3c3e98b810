//! Text cleanup and narration pacing before speech synthesis.

use once_cell::sync::Lazy;
use regex::Regex;

/// Typographic characters and their plain replacements.
const TYPOGRAPHIC_CHARS: &[(char, &str)] = &[
    ('\u{2018}', "'"),   // Left single quote
    ('\u{2019}', "'"),   // Right single quote
    ('\u{201c}', "\""),  // Left double quote
    ('\u{201d}', "\""),  // Right double quote
    ('\u{00ab}', "\""),  // Left-pointing double angle quote
    ('\u{00bb}', "\""),  // Right-pointing double angle quote
    ('\u{2013}', "-"),   // En dash
    ('\u{2014}', " - "), // Em dash
    ('\u{2011}', "-"),   // Non-breaking hyphen
    ('\u{2026}', "..."), // Ellipsis
    ('\u{00a0}', " "),   // Non-breaking space
    ('\u{200b}', ""),    // Zero-width space
    ('\u{feff}', ""),    // BOM
];

static STRONG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*{1,3}([^*\n]+?)\*{1,3}").unwrap());
static UNDERLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"__([^_\n]+?)__").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").unwrap());
static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+").unwrap());
static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#>`~=]").unwrap());
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[^\w\s.,!?;:()"'\-]"#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TERMINAL_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.!?]) ").unwrap());

/// Clean rewritten text for speech synthesis.
///
/// - Replaces typographic quotes, dashes and ellipses
/// - Strips markdown emphasis, bullets, numbered-list prefixes and `# > ` ~ =`
/// - Drops characters other than word characters, whitespace and basic punctuation
/// - Collapses all whitespace to single spaces
pub fn clean_for_speech(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    for c in text.chars() {
        match TYPOGRAPHIC_CHARS.iter().find(|(ch, _)| *ch == c) {
            Some((_, replacement)) => plain.push_str(replacement),
            None => plain.push(c),
        }
    }

    let text = STRONG.replace_all(&plain, "$1");
    let text = UNDERLINE.replace_all(&text, "$1");
    let text = BULLET.replace_all(&text, "");
    let text = NUMBERED.replace_all(&text, "");
    let text = MARKUP.replace_all(&text, "");
    let text = DISALLOWED.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");

    text.trim().to_string()
}

/// Slow a chunk down for storytelling narration.
///
/// Every space after terminal punctuation gets an extra period, commas get
/// a trailing space, and the chunk ends with a trailing ellipsis.
pub fn apply_storyteller_pacing(chunk: &str) -> String {
    let paced = TERMINAL_SPACE.replace_all(chunk, "$1. ");
    let paced = paced.replace(',', ", ");
    format!("{} ...", paced)
}
