//! Workflow context carried across the Upload, Rewrite and Generate steps.

use chrono::{DateTime, Utc};
use llm_client::ChatMessage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

use crate::error::{NarrateError, Result};

/// Where the workflow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No source text yet
    Upload,
    /// Source text present, not rewritten
    Rewrite,
    /// Rewritten text present; audio may or may not exist
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Upload => write!(f, "Step 1: Upload"),
            Stage::Rewrite => write!(f, "Step 2: Rewrite"),
            Stage::Generate => write!(f, "Step 3: Generate & Chat"),
        }
    }
}

/// State of one narration workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Identifier derived from the source text and creation time
    pub session_id: String,
    /// Uploaded file paths or the fetched URL
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub rewritten_text: String,
    #[serde(default)]
    pub audio_path: Option<PathBuf>,
    /// Chat history, kept when the source is replaced
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for WorkflowContext {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            session_id: String::new(),
            sources: Vec::new(),
            original_text: String::new(),
            rewritten_text: String::new(),
            audio_path: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        if self.original_text.is_empty() {
            Stage::Upload
        } else if self.rewritten_text.is_empty() {
            Stage::Rewrite
        } else {
            Stage::Generate
        }
    }

    /// Whether the given sources are the ones already loaded.
    pub fn has_sources(&self, sources: &[String]) -> bool {
        !self.sources.is_empty() && self.sources == sources
    }

    /// Replace the source material, discarding derived text and audio.
    pub fn replace_source(&mut self, sources: Vec<String>, text: String) {
        let now = Utc::now();
        self.session_id = compute_session_id(&text, now);
        self.sources = sources;
        self.original_text = text;
        self.rewritten_text.clear();
        self.audio_path = None;
        self.created_at = now;
        self.updated_at = now;
    }

    /// Store rewritten text. Clears any audio made from an older rewrite.
    pub fn record_rewrite(&mut self, text: String) -> Result<()> {
        if self.original_text.is_empty() {
            return Err(NarrateError::NoSourceText);
        }
        self.rewritten_text = text;
        self.audio_path = None;
        self.touch();
        Ok(())
    }

    pub fn record_audio(&mut self, path: PathBuf) -> Result<()> {
        if self.rewritten_text.is_empty() {
            return Err(NarrateError::NotRewritten);
        }
        self.audio_path = Some(path);
        self.touch();
        Ok(())
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// First 16 hex chars of the text's SHA-256 plus a timestamp.
pub fn compute_session_id(text: &str, at: DateTime<Utc>) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hash = format!("{:x}", digest);
    format!("{}_{}", &hash[..16], at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use llm_client::Role;

    #[test]
    fn test_new_context_is_at_upload() {
        let ctx = WorkflowContext::new();
        assert_eq!(ctx.stage(), Stage::Upload);
        assert_eq!(ctx.stage().to_string(), "Step 1: Upload");
    }

    #[test]
    fn test_stages_advance() {
        let mut ctx = WorkflowContext::new();
        ctx.replace_source(vec!["story.txt".to_string()], "Once.".to_string());
        assert_eq!(ctx.stage(), Stage::Rewrite);

        ctx.record_rewrite("Once upon a time.".to_string()).unwrap();
        assert_eq!(ctx.stage(), Stage::Generate);

        ctx.record_audio(PathBuf::from("/tmp/narration.mp3")).unwrap();
        assert_eq!(ctx.audio_path, Some(PathBuf::from("/tmp/narration.mp3")));
    }

    #[test]
    fn test_rewrite_requires_source() {
        let mut ctx = WorkflowContext::new();
        assert!(matches!(
            ctx.record_rewrite("x".to_string()),
            Err(NarrateError::NoSourceText)
        ));
    }

    #[test]
    fn test_audio_requires_rewrite() {
        let mut ctx = WorkflowContext::new();
        ctx.replace_source(vec![], "Text.".to_string());
        assert!(matches!(
            ctx.record_audio(PathBuf::from("a.mp3")),
            Err(NarrateError::NotRewritten)
        ));
    }

    #[test]
    fn test_replace_source_resets_derived_state_but_keeps_chat() {
        let mut ctx = WorkflowContext::new();
        ctx.replace_source(vec!["a.txt".to_string()], "First.".to_string());
        ctx.record_rewrite("First, retold.".to_string()).unwrap();
        ctx.record_audio(PathBuf::from("a.mp3")).unwrap();
        ctx.push_message(ChatMessage::user("hello"));

        ctx.replace_source(vec!["b.txt".to_string()], "Second.".to_string());

        assert_eq!(ctx.original_text, "Second.");
        assert!(ctx.rewritten_text.is_empty());
        assert!(ctx.audio_path.is_none());
        assert_eq!(ctx.messages.len(), 1);
        assert_eq!(ctx.messages[0].role, Role::User);
    }

    #[test]
    fn test_new_rewrite_drops_stale_audio() {
        let mut ctx = WorkflowContext::new();
        ctx.replace_source(vec![], "Text.".to_string());
        ctx.record_rewrite("One.".to_string()).unwrap();
        ctx.record_audio(PathBuf::from("a.mp3")).unwrap();
        ctx.record_rewrite("Two.".to_string()).unwrap();
        assert!(ctx.audio_path.is_none());
    }

    #[test]
    fn test_has_sources() {
        let mut ctx = WorkflowContext::new();
        assert!(!ctx.has_sources(&[]));
        ctx.replace_source(vec!["a.pdf".to_string()], "Text.".to_string());
        assert!(ctx.has_sources(&["a.pdf".to_string()]));
        assert!(!ctx.has_sources(&["b.pdf".to_string()]));
    }

    #[test]
    fn test_compute_session_id() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let id = compute_session_id("hello", at);
        assert_eq!(id, "2cf24dba5fb0a30e_20240501_123000");
    }
}
