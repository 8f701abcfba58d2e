/*!
Object storage backup and restore.
*/

use tracing::info;

use super::Transfer;
use crate::cloud::ObjectStorage;
use crate::observability::{record_resources, Direction};
use crate::records::ObjectRecord;
use crate::snapshot::{SnapshotFile, SnapshotStore};
use crate::storage::StorageAdapter;
use crate::Result;

/// Capture every bucket name and every object body
///
/// The bucket list is written before any object is fetched, so empty buckets
/// survive a round trip. Object records are written once, after the last
/// bucket. Read-only with respect to the source environment.
pub async fn backup_object_storage<S: StorageAdapter>(
    storage: &dyn ObjectStorage,
    store: &SnapshotStore<S>,
) -> Result<Transfer> {
    let buckets = storage.list_buckets().await?;
    store.write(SnapshotFile::Buckets, &buckets)?;

    let mut objects = Vec::new();
    for bucket in &buckets {
        info!(bucket = %bucket, "Working on bucket");
        for key in storage.list_object_keys(bucket).await? {
            info!(bucket = %bucket, key = %key, "Working on object");
            let object_body = storage.get_object(bucket, &key).await?;
            objects.push(ObjectRecord {
                bucket_name: bucket.clone(),
                object_key: key,
                object_body,
            });
        }
    }

    store.write(SnapshotFile::Objects, &objects)?;

    record_resources("buckets", Direction::Backup, buckets.len());
    record_resources("objects", Direction::Backup, objects.len());
    Ok(Transfer {
        containers: buckets.len(),
        items: objects.len(),
    })
}

/// Recreate buckets, then put every object back
///
/// Objects are restored even when the bucket list is empty. Same-key objects
/// already present in the target are overwritten.
pub async fn restore_object_storage<S: StorageAdapter>(
    storage: &dyn ObjectStorage,
    store: &SnapshotStore<S>,
) -> Result<Transfer> {
    let buckets: Vec<String> = store.read(SnapshotFile::Buckets)?;
    for bucket in &buckets {
        info!(bucket = %bucket, "Restoring bucket");
        storage.create_bucket(bucket).await?;
    }

    let objects: Vec<ObjectRecord> = store.read(SnapshotFile::Objects)?;
    if !objects.is_empty() {
        info!(count = objects.len(), "Restoring objects");
    }
    let restored = objects.len();
    for object in objects {
        storage
            .put_object(&object.bucket_name, &object.object_key, object.object_body)
            .await?;
    }

    record_resources("buckets", Direction::Restore, buckets.len());
    record_resources("objects", Direction::Restore, restored);
    Ok(Transfer {
        containers: buckets.len(),
        items: restored,
    })
}
