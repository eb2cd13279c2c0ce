//! Per-profile chat history persisted as JSON files

use crate::{DbError, Result};
use medibot_core::ChatHistory;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Stores `<dir>/<profile>_chat_history.json`
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    /// Create a store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of a profile's history file
    pub fn path_for(&self, profile: &str) -> Result<PathBuf> {
        validate_profile(profile)?;
        Ok(self.dir.join(format!("{}_chat_history.json", profile)))
    }

    /// Load a profile's history; a missing file is an empty history
    #[instrument(skip(self))]
    pub fn load(&self, profile: &str) -> Result<ChatHistory> {
        let path = self.path_for(profile)?;
        if !path.exists() {
            debug!("No history file at {}", path.display());
            return Ok(ChatHistory::new());
        }

        let json = std::fs::read_to_string(&path)?;
        let history = ChatHistory::from_json(&json)?;
        debug!("Loaded {} chats from {}", history.len(), path.display());
        Ok(history)
    }

    /// Persist a profile's history; an empty history removes the file
    #[instrument(skip(self, history), fields(chats = history.len()))]
    pub fn save(&self, profile: &str, history: &ChatHistory) -> Result<()> {
        if history.is_empty() {
            return self.delete(profile);
        }

        let path = self.path_for(profile)?;
        std::fs::create_dir_all(&self.dir)?;

        // Write to a sibling file first so a crash never truncates the history
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, history.to_json()?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Delete a profile's history file if present
    #[instrument(skip(self))]
    pub fn delete(&self, profile: &str) -> Result<()> {
        let path = self.path_for(profile)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Profile names become file names
fn validate_profile(profile: &str) -> Result<()> {
    let valid = !profile.is_empty()
        && !profile.starts_with('.')
        && profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidProfile(profile.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty_history() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path());

        let history = store.load("alice").unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("chat_histories"));

        let mut history = ChatHistory::new();
        let session = history.new_session();
        session.push_user("What is anemia?");
        session.push_assistant("A lack of healthy red blood cells.");

        store.save("alice", &history).unwrap();
        assert!(dir
            .path()
            .join("chat_histories/alice_chat_history.json")
            .exists());

        let loaded = store.load("alice").unwrap();
        assert_eq!(loaded, history);
    }

    #[test]
    fn test_empty_history_removes_file() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path());

        let mut history = ChatHistory::new();
        history.new_session();
        store.save("bob", &history).unwrap();
        let path = store.path_for("bob").unwrap();
        assert!(path.exists());

        history.clear();
        store.save("bob", &history).unwrap();
        assert!(!path.exists());

        // Deleting twice is fine
        store.delete("bob").unwrap();
    }

    #[test]
    fn test_invalid_profiles() {
        let store = HistoryStore::new("/tmp");
        for bad in ["", "../etc", ".hidden", "a/b", "name with space"] {
            assert!(
                matches!(store.path_for(bad), Err(DbError::InvalidProfile(_))),
                "accepted {bad:?}"
            );
        }
        assert!(store.path_for("dr.smith-2").is_ok());
    }
}
