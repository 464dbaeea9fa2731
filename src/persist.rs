//! On-disk wizard state. One JSON file, rewritten whole after every
//! state-affecting action, read once at startup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use thiserror::Error;

use crate::wizard::state::{Step, WizardState, STATE_VERSION};

pub const STATE_FILE_NAME: &str = "wizard-state.json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write wizard state: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode wizard state: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateStore { path: path.into() }
    }

    /// `~/.config/bdm-installer/wizard-state.json` on Linux.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Could not resolve a user config directory")?;
        Ok(base.join("bdm-installer").join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, state: &WizardState) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Restores a prior run. Anything unusable (unreadable file, parse
    /// failure, version mismatch) discards the stale file and starts over;
    /// a resumable record never blocks startup.
    pub fn load(&self) -> Option<WizardState> {
        let raw = fs::read_to_string(&self.path).ok()?;

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "[PHASE: persist] [STEP: load] unreadable state file, discarding: {}",
                    e
                );
                self.discard();
                return None;
            }
        };

        if value.get("version").and_then(|v| v.as_u64()) != Some(u64::from(STATE_VERSION)) {
            warn!("[PHASE: persist] [STEP: load] version mismatch, discarding saved state");
            self.discard();
            return None;
        }

        let mut state: WizardState = match serde_json::from_value(value) {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    "[PHASE: persist] [STEP: load] malformed state record, discarding: {}",
                    e
                );
                self.discard();
                return None;
            }
        };

        state.current_step = state.current_step.min(Step::COUNT - 1);
        info!(
            "[PHASE: persist] [STEP: load] resumed at step {}",
            state.current_step
        );
        Some(state)
    }

    pub fn discard(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join(STATE_FILE_NAME))
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let mut state = WizardState::new();
        state.current_step = 3;
        state.token = "tok".to_string();
        state.config.db_password = "secret".to_string();
        state.config_saved = true;

        store.save(&state).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn missing_file_yields_none_without_side_effects() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn version_mismatch_discards_file() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let mut state = WizardState::new();
        state.version = 99;
        store.save(&state).unwrap();

        assert!(store.load().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn garbage_file_discards_and_starts_fresh() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{not json").unwrap();

        assert!(store.load().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn out_of_range_step_clamps_to_last_page() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"version":1,"currentStep":42}"#).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.current_step, 7);
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("deep").join(STATE_FILE_NAME));
        store.save(&WizardState::new()).unwrap();
        assert!(store.path().exists());
    }
}
