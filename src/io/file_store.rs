use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tempfile::NamedTempFile;

use crate::io::lock::FileLock;
use crate::io::store::{KeyValueStore, StoreError};

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Key/value store persisted as one JSON object on disk, shared by every
/// process pointed at the same file.
///
/// Reads go to disk each time, so writes from other processes are visible
/// on the next access. Writes take an advisory lock for the
/// read-modify-write and replace the file atomically.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open (or prepare to create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::WriteError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(FileStore {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Current contents. A missing file is an empty store. A corrupted file
    /// is backed up as `.bak` and treated as empty.
    fn load(&self) -> Result<IndexMap<String, String>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(IndexMap::new()),
            Err(e) => {
                return Err(StoreError::ReadError {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(IndexMap::new());
        }
        match serde_json::from_str(&content) {
            Ok(items) => Ok(items),
            Err(e) => {
                let bak = self.path.with_extension("json.bak");
                let _ = fs::copy(&self.path, &bak);
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %bak.display(),
                    error = %e,
                    "storage file could not be parsed, starting empty"
                );
                Ok(IndexMap::new())
            }
        }
    }

    /// Reads never fail; an unreadable store reads as empty.
    fn snapshot(&self) -> IndexMap<String, String> {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "storage read failed");
            IndexMap::new()
        })
    }

    fn update<F>(&mut self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut IndexMap<String, String>),
    {
        let _lock = FileLock::acquire_default(&self.lock_path())?;
        let mut items = self.load()?;
        apply(&mut items);
        let content = serde_json::to_string_pretty(&items)?;
        atomic_write(&self.path, content.as_bytes()).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl KeyValueStore for FileStore {
    fn keys(&self) -> Vec<String> {
        self.snapshot().into_keys().collect()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.snapshot().swap_remove(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        self.update(|items| {
            items.shift_remove(key);
        })
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.snapshot().into_iter().collect()
    }
}
