//! Article text from web pages.

use anyhow::{Context, Result};
use html2text::render::text_renderer::TrivialDecorator;
use once_cell::sync::Lazy;
use regex::Regex;

/// Browser user agent; many sites refuse the default reqwest one.
const USER_AGENT: &str = "Mozilla/5.0";

static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p\s*>").unwrap());
static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<!--.*?-->")
        .unwrap()
});

/// Fetch a page and return the text of its `<p>` elements, one per line.
pub async fn fetch_article(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("{} returned status {}", url, status);
    }

    let html = response.text().await.context("Failed to read page body")?;
    Ok(paragraph_text(&html))
}

/// Text of every `<p>` element, joined with newlines. Empty when the page
/// has no paragraphs.
pub fn paragraph_text(html: &str) -> String {
    let html = SCRIPT_OR_STYLE.replace_all(html, "");

    PARAGRAPH
        .captures_iter(&html)
        .map(|caps| inner_text(&caps[1]))
        .collect::<Vec<_>>()
        .join("\n")
}

fn inner_text(fragment: &str) -> String {
    let rendered =
        html2text::from_read_with_decorator(fragment.as_bytes(), 1000, TrivialDecorator::new());
    rendered.split_whitespace().collect::<Vec<_>>().join(" ")
}
