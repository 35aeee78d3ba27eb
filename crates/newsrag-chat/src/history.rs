//! Chat history persisted as a JSON array of turns.

use std::path::{Path, PathBuf};

use tracing::debug;

use newsrag_core::types::ChatTurn;

use crate::error::ChatError;

/// File-backed chat history.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored turns, oldest first. A missing file is an empty history.
    pub async fn load(&self) -> Result<Vec<ChatTurn>, ChatError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the stored history with `turns`.
    pub async fn save(&self, turns: &[ChatTurn]) -> Result<(), ChatError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(turns)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), turns = turns.len(), "Saved chat history");
        Ok(())
    }

    /// Delete the history file if present.
    pub async fn clear(&self) -> Result<(), ChatError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Cleared chat history");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
