//! Saving and loading the workflow context between runs.

use super::types::WorkflowContext;
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

const SESSION_FILE: &str = "session.json";

/// JSON store for the current workflow context.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform's local data directory.
    pub fn open_default() -> Result<Self> {
        let dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .map(|d| d.join("gen-narration"))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(Self::new(dir))
    }

    pub fn session_file(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// Load the saved context, if any.
    pub fn load(&self) -> Result<Option<WorkflowContext>> {
        let path = self.session_file();
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path).context("Failed to open session file")?;
        let context = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Corrupt session file {}", path.display()))?;
        Ok(Some(context))
    }

    /// Load the saved context or start an empty one.
    pub fn load_or_default(&self) -> Result<WorkflowContext> {
        Ok(self.load()?.unwrap_or_else(WorkflowContext::new))
    }

    pub fn save(&self, context: &WorkflowContext) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let mut context = context.clone();
        context.updated_at = Utc::now();

        let file = File::create(self.session_file()).context("Failed to create session file")?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &context).context("Failed to write session JSON")?;
        log::debug!("saved session {}", context.session_id);
        Ok(())
    }

    /// Delete the saved context. Generated audio files are left alone.
    /// Returns whether there was anything to delete.
    pub fn clear(&self) -> Result<bool> {
        let path = self.session_file();
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).context("Failed to remove session file")?;
        Ok(true)
    }
}
