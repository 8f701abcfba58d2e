/*!
Snapshot store: the six on-disk artifacts of a backup run.

Each artifact is a JSON array written wholesale by backup and read once by
restore. Nothing is merged with earlier runs.
*/

use crate::{storage::StorageAdapter, Result, StackshotError};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use tracing::debug;

/// The six artifacts written by a backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotFile {
    Buckets,
    Objects,
    Queues,
    Messages,
    Topics,
    Subscriptions,
}

impl SnapshotFile {
    /// Every artifact, in the order a backup run writes them
    pub const ALL: [SnapshotFile; 6] = [
        SnapshotFile::Buckets,
        SnapshotFile::Objects,
        SnapshotFile::Queues,
        SnapshotFile::Messages,
        SnapshotFile::Topics,
        SnapshotFile::Subscriptions,
    ];

    /// Fixed file name of the artifact
    pub fn file_name(self) -> &'static str {
        match self {
            SnapshotFile::Buckets => "s3_buckets.json",
            SnapshotFile::Objects => "s3_objects.json",
            SnapshotFile::Queues => "sqs_queues.json",
            SnapshotFile::Messages => "sqs_messages.json",
            SnapshotFile::Topics => "sns_topics.json",
            SnapshotFile::Subscriptions => "sns_subs.json",
        }
    }
}

impl fmt::Display for SnapshotFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Reads and writes snapshot artifacts through a storage adapter
///
/// # Example
/// ```rust
/// use stackshot_core::{LocalFileStorage, SnapshotFile, SnapshotStore};
///
/// let dir = std::env::temp_dir().join("stackshot-store-doc");
/// let store = SnapshotStore::new(LocalFileStorage::with_base_dir(&dir));
///
/// store.write(SnapshotFile::Buckets, &vec!["photos".to_string()])?;
/// let buckets: Vec<String> = store.read(SnapshotFile::Buckets)?;
/// assert_eq!(buckets, vec!["photos".to_string()]);
/// # Ok::<(), stackshot_core::StackshotError>(())
/// ```
pub struct SnapshotStore<S: StorageAdapter> {
    storage: S,
}

impl<S: StorageAdapter> SnapshotStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Underlying storage adapter
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Serialize `records` and replace the artifact
    pub fn write<T: Serialize + ?Sized>(&self, file: SnapshotFile, records: &T) -> Result<()> {
        let data = serde_json::to_vec(records)?;
        debug!(file = %file, size = data.len(), "Writing snapshot file");
        self.storage.save(&data, file.file_name())
    }

    /// Load and deserialize an artifact
    ///
    /// # Errors
    /// * `StackshotError::MissingSnapshot` - the artifact was never written
    /// * `StackshotError::Json` - the artifact is not the expected shape
    pub fn read<T: DeserializeOwned>(&self, file: SnapshotFile) -> Result<T> {
        let name = file.file_name();
        if !self.storage.exists(name) {
            return Err(StackshotError::MissingSnapshot(self.storage.describe(name)));
        }

        let data = self.storage.load(name)?;
        debug!(file = %file, size = data.len(), "Read snapshot file");
        Ok(serde_json::from_slice(&data)?)
    }

    /// Whether the artifact is present
    pub fn exists(&self, file: SnapshotFile) -> bool {
        self.storage.exists(file.file_name())
    }
}
