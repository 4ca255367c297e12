// store.rs - InitiativeStore: persistence for initiative state.
//
// Each initiative owns a directory under the initiatives root; its lifecycle
// state is `<initiatives_dir>/<id>/state.yaml` and its artifacts live beside
// it (`tier1/`, `tier2/`, ...). Read-modify-write sequences take an exclusive
// advisory lock on `<id>/.state.lock` so concurrent writers serialize.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::InitiativeError;
use crate::state::InitiativeState;

/// File name of the persisted state inside an initiative directory.
pub const STATE_FILE: &str = "state.yaml";
const LOCK_FILE: &str = ".state.lock";

/// Persistent store for initiative state documents.
#[derive(Debug, Clone)]
pub struct InitiativeStore {
    initiatives_dir: PathBuf,
}

impl InitiativeStore {
    /// Create a store rooted at `initiatives_dir`. The directory need not exist
    /// until the first initiative is created.
    pub fn new(initiatives_dir: impl AsRef<Path>) -> Self {
        Self {
            initiatives_dir: initiatives_dir.as_ref().to_path_buf(),
        }
    }

    /// Root of an initiative's artifact tree.
    pub fn initiative_dir(&self, initiative_id: &str) -> PathBuf {
        self.initiatives_dir.join(initiative_id)
    }

    pub fn state_path(&self, initiative_id: &str) -> PathBuf {
        self.initiative_dir(initiative_id).join(STATE_FILE)
    }

    pub fn exists(&self, initiative_id: &str) -> bool {
        self.state_path(initiative_id).is_file()
    }

    /// Load the state of an initiative.
    ///
    /// Returns `NotFound` when the state file is absent; read and parse
    /// failures are reported as `IoError` / `YamlError`.
    pub fn load(&self, initiative_id: &str) -> Result<InitiativeState, InitiativeError> {
        let path = self.state_path(initiative_id);
        let content = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                InitiativeError::NotFound(initiative_id.to_string())
            } else {
                InitiativeError::IoError {
                    path: path.display().to_string(),
                    source,
                }
            }
        })?;
        serde_yaml::from_str(&content).map_err(|source| InitiativeError::YamlError {
            path: path.display().to_string(),
            source,
        })
    }

    /// Write an initiative's state (creates or overwrites).
    pub fn save(&self, state: &InitiativeState) -> Result<(), InitiativeError> {
        let dir = self.initiative_dir(&state.metadata.id);
        fs::create_dir_all(&dir).map_err(|source| InitiativeError::IoError {
            path: dir.display().to_string(),
            source,
        })?;
        let path = dir.join(STATE_FILE);
        let yaml = serde_yaml::to_string(state).map_err(|source| InitiativeError::YamlError {
            path: path.display().to_string(),
            source,
        })?;
        fs::write(&path, yaml).map_err(|source| InitiativeError::IoError {
            path: path.display().to_string(),
            source,
        })
    }

    /// Create a new initiative in the `draft` stage.
    pub fn create(
        &self,
        initiative_id: &str,
        title: &str,
    ) -> Result<InitiativeState, InitiativeError> {
        if self.exists(initiative_id) {
            return Err(InitiativeError::AlreadyExists(initiative_id.to_string()));
        }
        let state = InitiativeState::new(initiative_id, title);
        self.save(&state)?;
        tracing::info!(initiative = initiative_id, "created initiative");
        Ok(state)
    }

    /// Ids of all initiatives with a readable state file, sorted.
    pub fn list(&self) -> Result<Vec<String>, InitiativeError> {
        if !self.initiatives_dir.exists() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&self.initiatives_dir).map_err(|source| InitiativeError::IoError {
                path: self.initiatives_dir.display().to_string(),
                source,
            })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| InitiativeError::IoError {
                path: self.initiatives_dir.display().to_string(),
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.load(&id) {
                Ok(_) => ids.push(id),
                Err(e) => tracing::debug!(initiative = %id, error = %e, "skipping initiative"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Take the exclusive per-initiative lock, blocking until it is free.
    ///
    /// The lock is held until the returned guard is dropped.
    pub fn lock(&self, initiative_id: &str) -> Result<StateLock, InitiativeError> {
        let dir = self.initiative_dir(initiative_id);
        fs::create_dir_all(&dir).map_err(|source| InitiativeError::IoError {
            path: dir.display().to_string(),
            source,
        })?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| InitiativeError::IoError {
                path: path.display().to_string(),
                source,
            })?;
        file.lock_exclusive()
            .map_err(|source| InitiativeError::IoError {
                path: path.display().to_string(),
                source,
            })?;
        tracing::debug!(initiative = initiative_id, "acquired state lock");
        Ok(StateLock { file, path })
    }
}

/// Guard for an exclusive initiative lock; unlocks on drop.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), "failed to release state lock: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn create_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = InitiativeStore::new(dir.path());

        let created = store.create("checkout", "Checkout v2").unwrap();
        let loaded = store.load("checkout").unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.stage, Stage::Draft);
        assert!(store.state_path("checkout").ends_with("checkout/state.yaml"));
    }

    #[test]
    fn create_refuses_existing_initiative() {
        let dir = tempdir().unwrap();
        let store = InitiativeStore::new(dir.path());
        store.create("checkout", "Checkout").unwrap();
        assert!(matches!(
            store.create("checkout", "Again"),
            Err(InitiativeError::AlreadyExists(_))
        ));
    }

    #[test]
    fn load_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = InitiativeStore::new(dir.path());
        assert!(matches!(
            store.load("nope"),
            Err(InitiativeError::NotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn load_corrupt_is_yaml_error() {
        let dir = tempdir().unwrap();
        let store = InitiativeStore::new(dir.path());
        fs::create_dir_all(store.initiative_dir("bad")).unwrap();
        fs::write(store.state_path("bad"), "stage: [\n").unwrap();
        assert!(matches!(
            store.load("bad"),
            Err(InitiativeError::YamlError { .. })
        ));
    }

    #[test]
    fn save_persists_stage_changes() {
        let dir = tempdir().unwrap();
        let store = InitiativeStore::new(dir.path());
        let mut state = store.create("checkout", "Checkout").unwrap();
        state.record_transition(Stage::Tier1Active, None);
        store.save(&state).unwrap();

        // A second store instance sees the write.
        let reopened = InitiativeStore::new(dir.path());
        let loaded = reopened.load("checkout").unwrap();
        assert_eq!(loaded.stage, Stage::Tier1Active);
        assert_eq!(loaded.history.len(), 1);
    }

    #[test]
    fn list_skips_directories_without_valid_state() {
        let dir = tempdir().unwrap();
        let store = InitiativeStore::new(dir.path());
        assert!(store.list().unwrap().is_empty());

        store.create("beta", "Beta").unwrap();
        store.create("alpha", "Alpha").unwrap();
        fs::create_dir_all(dir.path().join("no-state")).unwrap();
        fs::create_dir_all(dir.path().join("broken")).unwrap();
        fs::write(dir.path().join("broken").join(STATE_FILE), ":::").unwrap();
        fs::write(dir.path().join("stray.txt"), "x").unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn lock_blocks_second_holder_until_released() {
        let dir = tempdir().unwrap();
        let store = InitiativeStore::new(dir.path());
        store.create("checkout", "Checkout").unwrap();

        let guard = store.lock("checkout").unwrap();
        assert!(guard.path().ends_with(".state.lock"));

        let (tx, rx) = mpsc::channel();
        let other = store.clone();
        let handle = thread::spawn(move || {
            let _second = other.lock("checkout").unwrap();
            tx.send(()).unwrap();
        });

        // The second lock cannot be acquired while the first is held.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }
}
