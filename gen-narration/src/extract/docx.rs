//! Plain text from Word documents.

use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(/?)([A-Za-z0-9_:.\-]+)[^>]*?(/?)>").unwrap());
static ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-z]+);").unwrap());

/// Extract paragraph text from DOCX bytes, one paragraph per line.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Not a valid DOCX (zip) file")?;
    let mut entry = archive
        .by_name("word/document.xml")
        .context("DOCX has no word/document.xml")?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .context("Failed to read word/document.xml")?;

    Ok(document_text(&xml))
}

/// Walk WordprocessingML and collect the text of each `w:p`.
fn document_text(xml: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut last = 0;

    for caps in TAG.captures_iter(xml) {
        let Some(tag) = caps.get(0) else { continue };
        if in_text {
            current.push_str(&decode_entities(&xml[last..tag.start()]));
        }
        last = tag.end();

        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();

        match (&caps[2], closing) {
            ("w:p", false) if self_closing => paragraphs.push(String::new()),
            ("w:p", false) => current.clear(),
            ("w:p", true) => paragraphs.push(std::mem::take(&mut current)),
            ("w:t", false) => in_text = !self_closing,
            ("w:t", true) => in_text = false,
            ("w:tab", false) => current.push('\t'),
            ("w:br" | "w:cr", false) => current.push('\n'),
            _ => {}
        }
    }

    paragraphs.join("\n")
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => name
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
