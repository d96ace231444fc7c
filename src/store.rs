//! The profile store: one JSON file of saved accounts, replaced atomically.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, RotateError};
use crate::fs_utils::{atomic_write, read_optional, temp_path_for};
use crate::paths::Paths;
use crate::profile::Profiles;

/// The saved profiles in ~/.ccrotate/profiles.json
///
/// Every mutation is load, change in memory, then [`Store::save`]; the file
/// is never edited in place.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(paths: &Paths) -> Self {
        Self::at(&paths.profiles_file)
    }

    pub fn at(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a save stages its bytes before the rename
    pub fn temp_path(&self) -> PathBuf {
        temp_path_for(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the store, returning an empty map if the file doesn't exist
    pub fn load(&self) -> Result<Profiles> {
        let Some(bytes) = read_optional(&self.path)? else {
            debug!(path = %self.path.display(), "profile store absent, starting empty");
            return Ok(Profiles::new());
        };

        let profiles: Profiles =
            serde_json::from_slice(&bytes).map_err(|source| RotateError::CorruptStore {
                path: self.path.clone(),
                source,
            })?;
        debug!(count = profiles.len(), "loaded profile store");
        Ok(profiles)
    }

    /// Replace the store file atomically
    pub fn save(&self, profiles: &Profiles) -> Result<()> {
        let content = serde_json::to_vec_pretty(profiles).map_err(|source| {
            RotateError::Serialize {
                what: "profiles",
                source,
            }
        })?;
        atomic_write(&self.path, &content)?;
        debug!(count = profiles.len(), path = %self.path.display(), "saved profile store");
        Ok(())
    }

    /// Load, apply `f`, save. The closure's value is passed through.
    pub fn update<T>(&self, f: impl FnOnce(&mut Profiles) -> Result<T>) -> Result<T> {
        let mut profiles = self.load()?;
        let value = f(&mut profiles)?;
        self.save(&profiles)?;
        Ok(value)
    }
}
