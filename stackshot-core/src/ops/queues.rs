/*!
Queue backup (a destructive drain) and restore.
*/

use std::collections::HashMap;
use tracing::{info, warn};

use super::Transfer;
use crate::cloud::{FifoIds, MessageQueues};
use crate::observability::{record_resources, Direction};
use crate::records::{
    is_fifo_queue, queue_name_from_url, random_letters, MessageRecord, FIFO_PLACEHOLDER_LEN,
};
use crate::snapshot::{SnapshotFile, SnapshotStore};
use crate::storage::StorageAdapter;
use crate::Result;

/// Capture every queue URL and drain every queue
///
/// Each message is deleted from its queue as soon as it has been captured,
/// so running this twice yields an empty second snapshot. A queue is drained
/// at most `ApproximateNumberOfMessages` times; draining stops early when a
/// receive comes back empty. Message records are written once, after the
/// last queue.
pub async fn drain_backup<S: StorageAdapter>(
    queues: &dyn MessageQueues,
    store: &SnapshotStore<S>,
) -> Result<Transfer> {
    let queue_urls = queues.list_queue_urls().await?;
    store.write(SnapshotFile::Queues, &queue_urls)?;

    let mut messages = Vec::new();
    for queue_url in &queue_urls {
        info!(queue_url = %queue_url, "Processing queue");
        let expected = queues.approximate_message_count(queue_url).await?;
        info!(queue_url = %queue_url, expected, "Expecting messages");

        let drained = drain_queue(queues, queue_url, expected, &mut messages).await?;
        if drained < expected {
            warn!(
                queue_url = %queue_url,
                expected,
                drained,
                "Queue ran dry before its approximate count was reached"
            );
        }
    }

    store.write(SnapshotFile::Messages, &messages)?;

    record_resources("queues", Direction::Backup, queue_urls.len());
    record_resources("messages", Direction::Backup, messages.len());
    Ok(Transfer {
        containers: queue_urls.len(),
        items: messages.len(),
    })
}

async fn drain_queue(
    queues: &dyn MessageQueues,
    queue_url: &str,
    limit: usize,
    out: &mut Vec<MessageRecord>,
) -> Result<usize> {
    for drained in 0..limit {
        let Some(message) = queues.receive_one(queue_url).await? else {
            return Ok(drained);
        };
        out.push(MessageRecord {
            queue: queue_url.to_string(),
            body: message.body,
        });
        queues
            .delete_message(queue_url, &message.receipt_handle)
            .await?;
    }
    Ok(limit)
}

/// Placeholder ids for a FIFO send; nothing about the original ids was kept
fn fifo_placeholders() -> FifoIds {
    let mut rng = rand::thread_rng();
    FifoIds {
        group_id: random_letters(&mut rng, FIFO_PLACEHOLDER_LEN),
        deduplication_id: random_letters(&mut rng, FIFO_PLACEHOLDER_LEN),
    }
}

/// Recreate queues by name, then re-send every message
///
/// Names ending in `.fifo` are recreated as FIFO queues with content-based
/// deduplication. Messages go to the URL the recreated queue reports, or to
/// the persisted URL when their queue was not part of the queue list.
pub async fn restore_queues<S: StorageAdapter>(
    queues: &dyn MessageQueues,
    store: &SnapshotStore<S>,
) -> Result<Transfer> {
    let queue_urls: Vec<String> = store.read(SnapshotFile::Queues)?;

    let mut recreated = HashMap::new();
    for queue_url in &queue_urls {
        let name = queue_name_from_url(queue_url);
        let fifo = is_fifo_queue(name);
        info!(queue = %name, fifo, "Recreating queue");
        let new_url = queues.create_queue(name, fifo).await?;
        recreated.insert(queue_url.as_str(), new_url);
    }

    let messages: Vec<MessageRecord> = store.read(SnapshotFile::Messages)?;
    if !messages.is_empty() {
        info!(count = messages.len(), "Restoring messages");
    }
    for message in &messages {
        let target = recreated
            .get(message.queue.as_str())
            .map(String::as_str)
            .unwrap_or(&message.queue);
        let fifo = is_fifo_queue(&message.queue).then(fifo_placeholders);
        queues.send_message(target, &message.body, fifo).await?;
    }

    record_resources("queues", Direction::Restore, queue_urls.len());
    record_resources("messages", Direction::Restore, messages.len());
    Ok(Transfer {
        containers: queue_urls.len(),
        items: messages.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::memory::MemoryEnvironment;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_drain_backup_empties_source() {
        let source = MemoryEnvironment::new();
        let orders = source.seed_queue("orders", &["one", "two", "three"]);
        let empty = source.seed_queue("idle", &[]);

        let store = SnapshotStore::new(MemoryStorage::new());
        let transfer = drain_backup(&source, &store).await.unwrap();
        assert_eq!(transfer, Transfer { containers: 2, items: 3 });

        assert!(source.queue_bodies(&orders).is_empty());
        assert!(source.queue_bodies(&empty).is_empty());

        let urls: Vec<String> = store.read(SnapshotFile::Queues).unwrap();
        assert_eq!(urls, vec![orders.clone(), empty]);
        let messages: Vec<MessageRecord> = store.read(SnapshotFile::Messages).unwrap();
        assert_eq!(
            messages.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(),
            vec!["one", "two", "three"]
        );
        assert!(messages.iter().all(|m| m.queue == orders));

        // A second run finds nothing left
        let second = drain_backup(&source, &store).await.unwrap();
        assert_eq!(second.items, 0);
    }

    #[tokio::test]
    async fn test_stale_count_stops_without_fault() {
        let source = MemoryEnvironment::new();
        let url = source.seed_queue("stale", &["only"]);
        source.state().queues[0].count_skew = 4;

        let store = SnapshotStore::new(MemoryStorage::new());
        let transfer = drain_backup(&source, &store).await.unwrap();
        assert_eq!(transfer.items, 1);
        assert!(source.queue_bodies(&url).is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_recreates_fifo_queues() {
        let source = MemoryEnvironment::new();
        let fifo_url = source.seed_queue("events.fifo", &["a", "b", "c"]);
        let plain_url = source.seed_queue("jobs", &["x", "y"]);

        let store = SnapshotStore::new(MemoryStorage::new());
        drain_backup(&source, &store).await.unwrap();

        let target = MemoryEnvironment::new();
        let transfer = restore_queues(&target, &store).await.unwrap();
        assert_eq!(transfer, Transfer { containers: 2, items: 5 });

        assert_eq!(target.queue_bodies(&fifo_url), vec!["a", "b", "c"]);
        let mut plain = target.queue_bodies(&plain_url);
        plain.sort();
        assert_eq!(plain, vec!["x", "y"]);

        let state = target.state();
        let fifo_queue = state.queues.iter().find(|q| q.url == fifo_url).unwrap();
        assert!(fifo_queue.fifo);
        for message in &fifo_queue.messages {
            let ids = message.fifo.as_ref().expect("fifo ids on every send");
            assert_eq!(ids.group_id.len(), 3);
            assert_eq!(ids.deduplication_id.len(), 3);
            assert!(ids.group_id.chars().all(|c| c.is_ascii_alphabetic()));
        }
        let plain_queue = state.queues.iter().find(|q| q.url == plain_url).unwrap();
        assert!(!plain_queue.fifo);
        assert!(plain_queue.messages.iter().all(|m| m.fifo.is_none()));
    }

    #[tokio::test]
    async fn test_messages_follow_recreated_queue_url() {
        let source = MemoryEnvironment::with_endpoint("http://old-host:4566");
        source.seed_queue("jobs", &["x"]);
        let store = SnapshotStore::new(MemoryStorage::new());
        drain_backup(&source, &store).await.unwrap();

        let target = MemoryEnvironment::with_endpoint("http://new-host:4566");
        restore_queues(&target, &store).await.unwrap();

        assert_eq!(
            target.queue_bodies("http://new-host:4566/000000000000/jobs"),
            vec!["x"]
        );
    }

    #[tokio::test]
    async fn test_restore_twice_duplicates_messages() {
        let source = MemoryEnvironment::new();
        let url = source.seed_queue("jobs", &["x"]);
        let store = SnapshotStore::new(MemoryStorage::new());
        drain_backup(&source, &store).await.unwrap();

        let target = MemoryEnvironment::new();
        restore_queues(&target, &store).await.unwrap();
        restore_queues(&target, &store).await.unwrap();

        assert_eq!(target.queue_bodies(&url), vec!["x", "x"]);
    }
}
