/*!
Local filesystem storage adapter implementation.
*/

use super::StorageAdapter;
use crate::{Result, StackshotError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Keep the io error kind, adding what was being done and to which path
fn io_error(action: &str, path: &Path, source: io::Error) -> StackshotError {
    StackshotError::Io(io::Error::new(
        source.kind(),
        format!("Failed to {action} {}: {source}", path.display()),
    ))
}

/// Local filesystem storage adapter
///
/// Snapshot files are written relative to a base directory, which defaults to
/// the process working directory. Parent directories are created on save.
///
/// # Example
/// ```rust
/// use stackshot_core::storage::{LocalFileStorage, StorageAdapter};
///
/// let dir = std::env::temp_dir().join("stackshot-doc");
/// let storage = LocalFileStorage::with_base_dir(&dir);
/// storage.save(b"[]", "s3_buckets.json")?;
/// assert!(storage.exists("s3_buckets.json"));
/// # Ok::<(), stackshot_core::StackshotError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    base_dir: Option<PathBuf>,
}

impl LocalFileStorage {
    /// Storage rooted at the working directory
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// Storage rooted at `base_dir`
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.as_ref().to_path_buf()),
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => PathBuf::from(path),
        }
    }

    fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| io_error("create directory", parent, e))?;
            }
        }
        Ok(())
    }
}

impl Default for LocalFileStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageAdapter for LocalFileStorage {
    fn save(&self, data: &[u8], path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);
        self.ensure_parent_dir(&full_path)?;

        fs::write(&full_path, data).map_err(|e| io_error("write snapshot file", &full_path, e))
    }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve_path(path);

        fs::read(&full_path).map_err(|e| io_error("read snapshot file", &full_path, e))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).is_file()
    }

    fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);

        if full_path.exists() {
            fs::remove_file(&full_path)
                .map_err(|e| io_error("delete snapshot file", &full_path, e))?;
        }

        Ok(())
    }

    fn describe(&self, path: &str) -> String {
        self.resolve_path(path).display().to_string()
    }
}
