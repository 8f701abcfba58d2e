/*!
Storage adapters for snapshot artifacts.

The snapshot store only deals in named byte blobs; where those blobs live is
the adapter's concern. Production runs use the local filesystem.
*/

pub mod local;

use crate::Result;

/// Storage abstraction for saving and loading snapshot artifacts
#[cfg_attr(test, mockall::automock)]
pub trait StorageAdapter {
    /// Save data under `path`, replacing anything already there
    fn save(&self, data: &[u8], path: &str) -> Result<()>;

    /// Load the data stored under `path`
    fn load(&self, path: &str) -> Result<Vec<u8>>;

    /// Check whether anything is stored under `path`
    fn exists(&self, path: &str) -> bool;

    /// Delete the data stored under `path`; missing data is not an error
    fn delete(&self, path: &str) -> Result<()>;

    /// Human-readable location of `path`, for diagnostics
    fn describe(&self, path: &str) -> String {
        path.to_string()
    }
}

pub use local::LocalFileStorage;

/// Memory-based storage adapter for testing
#[cfg(test)]
#[derive(Default, Clone)]
pub struct MemoryStorage {
    data: std::sync::Arc<std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.data.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
impl StorageAdapter for MemoryStorage {
    fn save(&self, data: &[u8], path: &str) -> Result<()> {
        let mut storage = self.data.lock().unwrap();
        storage.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let storage = self.data.lock().unwrap();
        storage
            .get(path)
            .cloned()
            .ok_or_else(|| crate::StackshotError::storage(format!("Snapshot not found: {path}")))
    }

    fn exists(&self, path: &str) -> bool {
        let storage = self.data.lock().unwrap();
        storage.contains_key(path)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let mut storage = self.data.lock().unwrap();
        storage.remove(path);
        Ok(())
    }
}
