/*!
Backup and restore operations, one pair per service.

Every operation is a sequential enumerate-then-transfer loop. Backups
accumulate records in memory and write each artifact once; restores replay
artifacts in their persisted order against an environment assumed empty.
*/

pub mod object_storage;
pub mod queues;
pub mod topics;

pub use object_storage::{backup_object_storage, restore_object_storage};
pub use queues::{drain_backup, restore_queues};
pub use topics::{backup_topics, restore_topics};

/// What one backup or restore step moved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    /// Buckets, queues or topics
    pub containers: usize,
    /// Objects, messages or subscriptions
    pub items: usize,
}
