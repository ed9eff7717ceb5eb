use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiol_core::SessionPersistence;

use crate::error::ThlError;

/// On-disk layout of the state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    active_session_id: Option<String>,
}

/// Persists the active session id across runs.
#[derive(Debug, Clone)]
pub struct FileSessionState {
    path: PathBuf,
}

impl FileSessionState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionPersistence for FileSessionState {
    type Error = ThlError;

    fn load(&self) -> Result<Option<String>, ThlError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let state: StateFile = toml::from_str(&content)?;
        Ok(state.active_session_id.filter(|id| !id.is_empty()))
    }

    fn save(&mut self, session_id: &str) -> Result<(), ThlError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let state = StateFile {
            active_session_id: Some(session_id.to_string()),
        };
        std::fs::write(&self.path, toml::to_string(&state)?)?;
        Ok(())
    }
}

pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("thiol")
}

pub fn default_state_path() -> PathBuf {
    data_dir().join("state.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = FileSessionState::new(dir.path().join("state.toml"));
        assert_eq!(state.load().unwrap(), None);
    }

    #[test]
    fn saved_session_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut state = FileSessionState::new(&path);
        state.save("3f0c8a52-1d7e-4c4b-9a55-8e2f7f1d2b10").unwrap();

        let reloaded = FileSessionState::new(&path);
        assert_eq!(
            reloaded.load().unwrap().as_deref(),
            Some("3f0c8a52-1d7e-4c4b-9a55-8e2f7f1d2b10")
        );
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("active_session_id"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "active_session_id = [").unwrap();

        assert!(matches!(
            FileSessionState::new(&path).load(),
            Err(ThlError::Config(_))
        ));
    }
}
