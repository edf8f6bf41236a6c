//! Atomic TOML file operations.
//!
//! Small state files (the symptom ledger) are written through a temporary
//! file and an atomic rename so a crash mid-write never leaves a truncated
//! file behind. Writers serialize through an exclusive lock file.

use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use triage_core::TriageError;

/// Errors that can occur during atomic TOML operations.
#[derive(Debug, Error)]
pub enum AtomicTomlError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Lock error on {path}: {message}")]
    Lock { path: PathBuf, message: String },
}

impl From<AtomicTomlError> for TriageError {
    fn from(err: AtomicTomlError) -> Self {
        match err {
            AtomicTomlError::Io { .. } | AtomicTomlError::Lock { .. } => {
                TriageError::io(err.to_string())
            }
            AtomicTomlError::Parse { .. } | AtomicTomlError::Serialize(_) => {
                TriageError::Serialization {
                    format: "TOML".to_string(),
                    message: err.to_string(),
                }
            }
        }
    }
}

/// A typed handle to a TOML file written atomically.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> Clone for AtomicTomlFile<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> AtomicTomlError {
        AtomicTomlError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Loads and deserializes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicTomlError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        toml::from_str(&content)
            .map(Some)
            .map_err(|source| AtomicTomlError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Serializes and writes the file via tmp file + fsync + rename.
    pub fn save(&self, data: &T) -> Result<(), AtomicTomlError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let toml_string = toml::to_string_pretty(data)?;

        let tmp_path = self.temp_path();
        let mut tmp_file = File::create(&tmp_path).map_err(|e| self.io_err(e))?;
        tmp_file
            .write_all(toml_string.as_bytes())
            .map_err(|e| self.io_err(e))?;
        tmp_file.sync_all().map_err(|e| self.io_err(e))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }

    /// Load-modify-save under an exclusive lock.
    pub fn update<F>(&self, default_value: T, f: F) -> Result<T, AtomicTomlError>
    where
        F: FnOnce(&mut T),
        T: Clone,
    {
        let _lock = FileLock::acquire(&self.path)?;
        let mut data = self.load()?.unwrap_or(default_value);
        f(&mut data);
        self.save(&data)?;
        Ok(data)
    }

    /// Deletes the file. A missing file is not an error.
    pub fn remove(&self) -> Result<(), AtomicTomlError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        self.path.with_file_name(format!(".{}.tmp", file_name))
    }
}

/// Exclusive lock held for the lifetime of the guard.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, AtomicTomlError> {
        let lock_path = path.with_extension("lock");
        let lock_err = |message: String| AtomicTomlError::Lock {
            path: lock_path.clone(),
            message,
        };

        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| lock_err(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| lock_err(e.to_string()))?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| lock_err(format!("failed to acquire lock: {}", e)))?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Unlock happens when the handle closes; the lock file is best effort.
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        label: String,
        count: u32,
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicTomlFile::<Counter>::new(temp_dir.path().join("nested/counter.toml"));

        file.save(&Counter { label: "a".into(), count: 2 }).unwrap();

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.count, 2);
        assert!(!temp_dir.path().join("nested/.counter.toml.tmp").exists());
    }

    #[test]
    fn test_missing_and_empty_files_load_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("counter.toml");
        let file = AtomicTomlFile::<Counter>::new(path.clone());
        assert!(file.load().unwrap().is_none());

        fs::write(&path, "  \n").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_a_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("counter.toml");
        fs::write(&path, "count = [").unwrap();

        let err = AtomicTomlFile::<Counter>::new(path).load().unwrap_err();
        assert!(matches!(err, AtomicTomlError::Parse { .. }));
        let triage: TriageError = err.into();
        assert!(matches!(triage, TriageError::Serialization { .. }));
    }

    #[test]
    fn test_update_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicTomlFile::<Counter>::new(temp_dir.path().join("counter.toml"));
        let default = Counter { label: "d".into(), count: 0 };

        file.update(default.clone(), |c| c.count += 10).unwrap();
        let updated = file.update(default, |c| c.count += 5).unwrap();
        assert_eq!(updated.count, 15);
        assert!(!temp_dir.path().join("counter.lock").exists());

        file.remove().unwrap();
        file.remove().unwrap();
        assert!(file.load().unwrap().is_none());
    }
}
