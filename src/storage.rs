//! Local persistent storage of cached rules, ETags, and preferences.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Sub-directory for cached rule files.
const CACHE_SUBDIR: &str = "cache";

/// Sub-directory for cached file ETags, kept apart from the rule bytes so
/// neither can clobber the other.
const ETAG_SUBDIR: &str = "etag";

/// File holding the flat preference map.
const PREFERENCES_FILE: &str = "preferences.json";

/// Storage of cached rule files, their ETags, and a flat string preference
/// map.
///
/// Reads of absent entries return `Ok(None)` (or an empty map), never an
/// error; deletes are idempotent.
pub trait StorageProvider: Send + Sync {
    /// Read the contents of a cached file, `None` if it does not exist.
    fn read(&self, file_name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Write a cached file, replacing any previous content.
    fn write(&self, file_name: &str, data: &[u8]) -> io::Result<()>;

    /// Delete a cached file. Returns `true` if a file was removed.
    fn delete(&self, file_name: &str) -> io::Result<bool>;

    /// Delete all cached files.
    fn delete_files(&self) -> io::Result<()>;

    /// List the names of all cached files.
    fn list_files(&self) -> io::Result<Vec<String>>;

    /// Read the ETag recorded for a cached file, `None` if absent.
    fn read_file_etag(&self, file_name: &str) -> io::Result<Option<String>>;

    /// Record the ETag for a cached file.
    fn write_file_etag(&self, file_name: &str, e_tag: &str) -> io::Result<()>;

    /// Delete the ETag recorded for a cached file. Returns `true` if one
    /// was removed.
    fn delete_file_etag(&self, file_name: &str) -> io::Result<bool>;

    /// Delete all recorded ETags.
    fn delete_file_etags(&self) -> io::Result<()>;

    /// Read the preference map. An absent backing file yields an empty map.
    fn read_preferences(&self) -> io::Result<HashMap<String, String>>;

    /// Replace the preference map wholesale.
    fn write_preferences(&self, preferences: &HashMap<String, String>) -> io::Result<()>;

    /// Delete all preferences.
    fn delete_preferences(&self) -> io::Result<()>;
}

/// Default [`StorageProvider`] backed by a private directory on local disk.
///
/// Rule bytes live under `<root>/cache`, ETags under `<root>/etag`, and the
/// preference map is a JSON file at `<root>/preferences.json`.
pub struct FileStorageProvider {
    cache_dir: PathBuf,
    etag_dir: PathBuf,
    preferences_path: PathBuf,
}

impl FileStorageProvider {
    /// Create a provider rooted at `root`. Directories are created lazily.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            cache_dir: root.join(CACHE_SUBDIR),
            etag_dir: root.join(ETAG_SUBDIR),
            preferences_path: root.join(PREFERENCES_FILE),
        }
    }

    fn ensure_dirs_exist(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        fs::create_dir_all(&self.etag_dir)?;
        Ok(())
    }

    fn file_path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    fn etag_path(&self, file_name: &str) -> PathBuf {
        self.etag_dir.join(file_name)
    }
}

impl StorageProvider for FileStorageProvider {
    fn read(&self, file_name: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.file_path(file_name);
        if !path.exists() {
            return Ok(None);
        }
        fs::read(path).map(Some)
    }

    fn write(&self, file_name: &str, data: &[u8]) -> io::Result<()> {
        self.ensure_dirs_exist()?;
        fs::write(self.file_path(file_name), data)
    }

    fn delete(&self, file_name: &str) -> io::Result<bool> {
        let path = self.file_path(file_name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn delete_files(&self) -> io::Result<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
        }
        fs::create_dir_all(&self.cache_dir)
    }

    fn list_files(&self) -> io::Result<Vec<String>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn read_file_etag(&self, file_name: &str) -> io::Result<Option<String>> {
        let path = self.etag_path(file_name);
        if !path.exists() {
            return Ok(None);
        }
        let e_tag = fs::read_to_string(path)?;
        Ok(Some(e_tag.trim().to_string()))
    }

    fn write_file_etag(&self, file_name: &str, e_tag: &str) -> io::Result<()> {
        self.ensure_dirs_exist()?;
        fs::write(self.etag_path(file_name), e_tag.trim())
    }

    fn delete_file_etag(&self, file_name: &str) -> io::Result<bool> {
        let path = self.etag_path(file_name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn delete_file_etags(&self) -> io::Result<()> {
        if self.etag_dir.exists() {
            fs::remove_dir_all(&self.etag_dir)?;
        }
        fs::create_dir_all(&self.etag_dir)
    }

    fn read_preferences(&self) -> io::Result<HashMap<String, String>> {
        if !self.preferences_path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.preferences_path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write_preferences(&self, preferences: &HashMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.preferences_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(preferences)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.preferences_path, content)
    }

    fn delete_preferences(&self) -> io::Result<()> {
        if self.preferences_path.exists() {
            fs::remove_file(&self.preferences_path)?;
        }
        Ok(())
    }
}
