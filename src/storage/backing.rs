//! Durable copies of the database file
//!
//! The working database lives on local disk. A backing store restores it
//! before a run and receives a copy after each year and at the end.

use crate::config::StorageConfig;
use crate::storage::traits::{StorageError, StorageResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Where the durable copy of the database lives
pub trait BackingStore: Send + Sync {
    /// Copies the durable database to `local`
    ///
    /// # Returns
    ///
    /// `false` if no durable copy exists yet; `local` is left as it was.
    fn download(&self, local: &Path) -> StorageResult<bool>;

    /// Replaces the durable copy with `local`
    fn upload(&self, local: &Path) -> StorageResult<()>;

    /// Human-readable location for logging
    fn describe(&self) -> String;
}

/// A backup file on a filesystem (typically a mounted volume)
#[derive(Debug, Clone)]
pub struct LocalBackingStore {
    location: PathBuf,
}

impl LocalBackingStore {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    fn backing_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Backing {
            location: self.location.display().to_string(),
            source,
        }
    }
}

/// Removes `-wal` and `-shm` files left by an earlier connection
///
/// A stale log next to a freshly copied database would be replayed into it.
fn remove_sidecars(local: &Path) -> std::io::Result<()> {
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = local.as_os_str().to_owned();
        sidecar.push(suffix);
        match fs::remove_file(PathBuf::from(sidecar)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

impl BackingStore for LocalBackingStore {
    fn download(&self, local: &Path) -> StorageResult<bool> {
        if !self.location.is_file() {
            return Ok(false);
        }

        if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        remove_sidecars(local)?;
        fs::copy(&self.location, local).map_err(|e| self.backing_error(e))?;
        Ok(true)
    }

    fn upload(&self, local: &Path) -> StorageResult<()> {
        let parent = match self.location.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| self.backing_error(e))?;

        // Copy beside the target, then rename over it
        let staged = tempfile::NamedTempFile::new_in(&parent).map_err(|e| self.backing_error(e))?;
        fs::copy(local, staged.path()).map_err(|e| self.backing_error(e))?;
        staged
            .persist(&self.location)
            .map_err(|e| self.backing_error(e.error))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.location.display().to_string()
    }
}

/// No durable copy; the local file is the only copy
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackingStore;

impl BackingStore for NoBackingStore {
    fn download(&self, local: &Path) -> StorageResult<bool> {
        Ok(local.is_file())
    }

    fn upload(&self, _local: &Path) -> StorageResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}

/// Chooses the backing store configured for `storage`
pub fn backing_store_for(storage: &StorageConfig) -> Box<dyn BackingStore> {
    match &storage.backup_path {
        Some(path) => Box::new(LocalBackingStore::new(path)),
        None => Box::new(NoBackingStore),
    }
}
