//! Persistent History Store
//!
//! A single JSON document holding the API key, reusable selector texts and
//! the log of completed compare sessions. Loading is best effort: a missing
//! or unreadable document yields an empty store.

use crate::error::{CompareError, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ai_api_key: Option<String>,
    #[serde(default)]
    pub raw_texts_used: Vec<String>,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: u64,
    pub selector_text: String,
    pub file_path1: String,
    pub file_path2: String,
    pub task_prompt: String,
    pub timestamp: String,
}

/// Answers collected for one compare session, stored as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionAnswers {
    pub selector_text: String,
    pub file_path1: String,
    pub file_path2: String,
    pub task_prompt: String,
}

impl HistoryStore {
    /// Id for the next record: one past the highest id on file.
    ///
    /// On an untouched history this equals `sessions.len() + 1`.
    pub fn next_session_id(&self) -> u64 {
        self.sessions.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }

    /// Append a record stamped with the current time and return it.
    pub fn record_session(&mut self, answers: SessionAnswers) -> &SessionRecord {
        let record = SessionRecord {
            id: self.next_session_id(),
            selector_text: answers.selector_text,
            file_path1: answers.file_path1,
            file_path2: answers.file_path2,
            task_prompt: answers.task_prompt,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        self.sessions.push(record);
        &self.sessions[self.sessions.len() - 1]
    }

    /// Remember a newly typed selector text. Blank text is not kept.
    pub fn remember_raw_text(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.raw_texts_used.push(text.to_string());
        true
    }
}

/// Location of the history document on disk.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store, falling back to an empty one on any failure.
    pub async fn load(&self) -> HistoryStore {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!("[HistoryFile] No history at {:?} ({}), starting fresh", self.path, e);
                return HistoryStore::default();
            }
        };

        match serde_json::from_str::<HistoryStore>(&json) {
            Ok(store) => {
                tracing::debug!(
                    "[HistoryFile] Loaded {} sessions and {} saved texts from {:?}",
                    store.sessions.len(),
                    store.raw_texts_used.len(),
                    self.path
                );
                store
            }
            Err(e) => {
                tracing::warn!("[HistoryFile] Ignoring unreadable history {:?}: {}", self.path, e);
                HistoryStore::default()
            }
        }
    }

    /// Overwrite the document with a pretty-printed copy of `store`.
    pub async fn save(&self, store: &HistoryStore) -> Result<()> {
        let json = serde_json::to_string_pretty(store)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| CompareError::HistorySave {
                    path: self.path.clone(),
                    source,
                })?;
        }

        fs::write(&self.path, json)
            .await
            .map_err(|source| CompareError::HistorySave {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!("[HistoryFile] Saved {} sessions to {:?}", store.sessions.len(), self.path);
        Ok(())
    }
}
