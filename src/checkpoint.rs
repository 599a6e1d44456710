/// Crash-safe persistence of linking progress.
///
/// The checkpoint maps each attempted query key to its [`MatchResult`], in
/// processing order. A `null` value means "searched, no match"; a key that
/// is absent was never attempted (or was skipped) and is retried next run.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::MatchResult;

pub type Checkpoint = IndexMap<String, MatchResult>;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("checkpoint {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// JSON file holding a [`Checkpoint`].
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint. A missing or blank file is an empty checkpoint.
    pub fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return Ok(Checkpoint::new());
            }
            Err(source) => {
                return Err(CheckpointError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if data.trim().is_empty() {
            return Ok(Checkpoint::new());
        }

        let checkpoint: Checkpoint =
            serde_json::from_str(&data).map_err(|source| CheckpointError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        info!(
            "Resuming from {} ({} records done)",
            self.path.display(),
            checkpoint.len()
        );
        Ok(checkpoint)
    }

    /// Write the checkpoint as pretty JSON.
    ///
    /// Data goes to a sibling temp file first and is renamed over the target,
    /// so a crash mid-write leaves the previous checkpoint intact.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let data = serde_json::to_string_pretty(checkpoint)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.write_error(source))?;
        }

        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp).map_err(|source| self.write_error(source))?;
        file.write_all(data.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|source| self.write_error(source))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|source| self.write_error(source))?;
        debug!("Saved {} entries to {}", checkpoint.len(), self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PersonProfile;
    use tempfile::tempdir;

    fn profile(name: &str) -> PersonProfile {
        PersonProfile {
            full_name: name.to_string(),
            ..PersonProfile::default()
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("matches.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_blank_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matches.json");
        fs::write(&path, "\n").unwrap();
        assert!(CheckpointStore::new(path).load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matches.json");
        fs::write(&path, "{\"A\": ").unwrap();
        assert!(matches!(
            CheckpointStore::new(path).load(),
            Err(CheckpointError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_save_keeps_order_and_null_entries() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested/matches.json"));

        let mut checkpoint = Checkpoint::new();
        checkpoint.insert("Zed Young".to_string(), Some(profile("Zed Young")));
        checkpoint.insert("Ann Lee".to_string(), None);
        store.save(&checkpoint).unwrap();

        let loaded = store.load().unwrap();
        let keys: Vec<&str> = loaded.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Zed Young", "Ann Lee"]);
        assert_eq!(loaded["Ann Lee"], None);
        assert_eq!(
            loaded["Zed Young"].as_ref().unwrap().phone_number,
            crate::model::PHONE_PLACEHOLDER
        );
        assert!(!dir.path().join("nested/matches.json.tmp").exists());
    }

    #[test]
    fn test_save_of_load_is_byte_identical() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("matches.json"));

        let mut checkpoint = Checkpoint::new();
        checkpoint.insert("B".to_string(), None);
        checkpoint.insert("A".to_string(), Some(profile("A")));
        store.save(&checkpoint).unwrap();
        let first = fs::read(store.path()).unwrap();

        store.save(&store.load().unwrap()).unwrap();
        assert_eq!(fs::read(store.path()).unwrap(), first);
    }
}
