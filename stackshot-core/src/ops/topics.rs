/*!
Topic and subscription backup and restore.
*/

use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::Transfer;
use crate::cloud::{SubscriptionSummary, Topics};
use crate::observability::{record_resources, Direction};
use crate::records::{
    dead_letter_target, redrive_policy, topic_name_from_arn, SubscriptionRecord,
};
use crate::snapshot::{SnapshotFile, SnapshotStore};
use crate::storage::StorageAdapter;
use crate::Result;

/// Subscription attribute carrying the dead-letter redrive policy
pub const REDRIVE_POLICY_ATTRIBUTE: &str = "RedrivePolicy";

/// ARN the service reports for subscriptions awaiting confirmation
const PENDING_CONFIRMATION: &str = "PendingConfirmation";

/// Capture every topic ARN and every subscription
///
/// Both artifacts are written even when there are no topics.
pub async fn backup_topics<S: StorageAdapter>(
    topics: &dyn Topics,
    store: &SnapshotStore<S>,
) -> Result<Transfer> {
    let topic_arns = topics.list_topic_arns().await?;
    if topic_arns.is_empty() {
        info!("No topics found");
    }
    store.write(SnapshotFile::Topics, &topic_arns)?;

    let mut subscriptions = Vec::new();
    for topic_arn in &topic_arns {
        info!(topic_arn = %topic_arn, "Working on topic");
        for summary in topics.list_subscriptions(topic_arn).await? {
            let dlq_arn = dead_letter_target_of(topics, &summary).await;
            subscriptions.push(SubscriptionRecord {
                topic_arn: topic_arn.clone(),
                subscription_arn: summary.subscription_arn,
                protocol: summary.protocol,
                endpoint: summary.endpoint,
                dlq_arn,
            });
        }
    }

    store.write(SnapshotFile::Subscriptions, &subscriptions)?;

    record_resources("topics", Direction::Backup, topic_arns.len());
    record_resources("subscriptions", Direction::Backup, subscriptions.len());
    Ok(Transfer {
        containers: topic_arns.len(),
        items: subscriptions.len(),
    })
}

async fn dead_letter_target_of(
    topics: &dyn Topics,
    summary: &SubscriptionSummary,
) -> Option<String> {
    let arn = summary.subscription_arn.as_str();
    if arn.is_empty() || arn == PENDING_CONFIRMATION {
        return None;
    }

    match topics.subscription_attributes(arn).await {
        Ok(attributes) => {
            let target = attributes
                .get(REDRIVE_POLICY_ATTRIBUTE)
                .and_then(|policy| dead_letter_target(policy));
            if let Some(dlq_arn) = &target {
                debug!(subscription_arn = %arn, dlq_arn = %dlq_arn, "Captured dead-letter target");
            }
            target
        }
        Err(e) => {
            warn!(
                subscription_arn = %arn,
                error = %e,
                "Could not read subscription attributes; keeping it without a dead-letter target"
            );
            None
        }
    }
}

/// Recreate topics by name, then resubscribe
///
/// Subscriptions with a captured dead-letter target are resubscribed with a
/// redrive policy whose receive count is fixed at 5.
pub async fn restore_topics<S: StorageAdapter>(
    topics: &dyn Topics,
    store: &SnapshotStore<S>,
) -> Result<Transfer> {
    let topic_arns: Vec<String> = store.read(SnapshotFile::Topics)?;

    let mut recreated = HashMap::new();
    for topic_arn in &topic_arns {
        let name = topic_name_from_arn(topic_arn);
        info!(topic = %name, "Restoring topic");
        let new_arn = topics.create_topic(name).await?;
        recreated.insert(topic_arn.as_str(), new_arn);
    }

    let subscriptions: Vec<SubscriptionRecord> = store.read(SnapshotFile::Subscriptions)?;
    if !subscriptions.is_empty() {
        info!(count = subscriptions.len(), "Restoring subscriptions");
    }
    for subscription in &subscriptions {
        let topic_arn = recreated
            .get(subscription.topic_arn.as_str())
            .map(String::as_str)
            .unwrap_or(&subscription.topic_arn);

        let mut attributes = HashMap::new();
        if let Some(dlq_arn) = &subscription.dlq_arn {
            attributes.insert(REDRIVE_POLICY_ATTRIBUTE.to_string(), redrive_policy(dlq_arn));
        }

        topics
            .subscribe(
                topic_arn,
                &subscription.protocol,
                &subscription.endpoint,
                attributes,
            )
            .await?;
    }

    record_resources("topics", Direction::Restore, topic_arns.len());
    record_resources("subscriptions", Direction::Restore, subscriptions.len());
    Ok(Transfer {
        containers: topic_arns.len(),
        items: subscriptions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::memory::MemoryEnvironment;
    use crate::storage::MemoryStorage;

    const DLQ: &str = "arn:aws:sqs:us-east-1:000000000000:orders-dlq";

    #[tokio::test]
    async fn test_backup_captures_dead_letter_target() {
        let source = MemoryEnvironment::new();
        let topic = source.seed_topic("orders");
        let policy = format!(r#"{{"deadLetterTargetArn":"{DLQ}","maxReceiveCount":"3"}}"#);
        source.seed_subscription(
            &topic,
            "sqs",
            "arn:aws:sqs:us-east-1:000000000000:orders-queue",
            &[(REDRIVE_POLICY_ATTRIBUTE, policy.as_str())],
        );
        source.seed_subscription(&topic, "http", "http://example.test/hook", &[]);

        let store = SnapshotStore::new(MemoryStorage::new());
        let transfer = backup_topics(&source, &store).await.unwrap();
        assert_eq!(transfer, Transfer { containers: 1, items: 2 });

        let records: Vec<SubscriptionRecord> = store.read(SnapshotFile::Subscriptions).unwrap();
        assert_eq!(records[0].dlq_arn.as_deref(), Some(DLQ));
        assert_eq!(records[0].topic_arn, topic);
        assert_eq!(records[1].dlq_arn, None);
        assert_eq!(records[1].protocol, "http");
    }

    #[tokio::test]
    async fn test_restore_applies_redrive_policy_only_with_dlq() {
        let store = SnapshotStore::new(MemoryStorage::new());
        let topic = "arn:aws:sns:us-east-1:000000000000:orders".to_string();
        store.write(SnapshotFile::Topics, &vec![topic.clone()]).unwrap();
        store
            .write(
                SnapshotFile::Subscriptions,
                &vec![
                    SubscriptionRecord {
                        topic_arn: topic.clone(),
                        subscription_arn: format!("{topic}:old-1"),
                        protocol: "sqs".to_string(),
                        endpoint: "arn:aws:sqs:us-east-1:000000000000:orders-queue".to_string(),
                        dlq_arn: Some(DLQ.to_string()),
                    },
                    SubscriptionRecord {
                        topic_arn: topic.clone(),
                        subscription_arn: format!("{topic}:old-2"),
                        protocol: "http".to_string(),
                        endpoint: "http://example.test/hook".to_string(),
                        dlq_arn: None,
                    },
                ],
            )
            .unwrap();

        let target = MemoryEnvironment::new();
        let transfer = restore_topics(&target, &store).await.unwrap();
        assert_eq!(transfer, Transfer { containers: 1, items: 2 });

        let state = target.state();
        let restored = &state.topics[0];
        assert_eq!(restored.arn, topic);
        assert_eq!(restored.subscriptions.len(), 2);

        let with_dlq = &restored.subscriptions[0];
        let policy: serde_json::Value =
            serde_json::from_str(&with_dlq.attributes[REDRIVE_POLICY_ATTRIBUTE]).unwrap();
        assert_eq!(policy["deadLetterTargetArn"], DLQ);
        assert_eq!(policy["maxReceiveCount"], "5");
        assert_ne!(with_dlq.arn, format!("{topic}:old-1"));

        assert!(restored.subscriptions[1].attributes.is_empty());
    }

    #[tokio::test]
    async fn test_empty_topics_still_write_artifacts() {
        let source = MemoryEnvironment::new();
        let store = SnapshotStore::new(MemoryStorage::new());

        let transfer = backup_topics(&source, &store).await.unwrap();
        assert_eq!(transfer, Transfer::default());
        assert!(store.exists(SnapshotFile::Topics));
        assert!(store.exists(SnapshotFile::Subscriptions));

        let target = MemoryEnvironment::new();
        assert_eq!(
            restore_topics(&target, &store).await.unwrap(),
            Transfer::default()
        );
    }

    #[tokio::test]
    async fn test_pending_subscription_skips_attribute_lookup() {
        let source = MemoryEnvironment::new();
        let topic = source.seed_topic("alerts");
        source.state().topics[0]
            .subscriptions
            .push(crate::cloud::memory::MemorySubscription {
                arn: PENDING_CONFIRMATION.to_string(),
                protocol: "email".to_string(),
                endpoint: "ops@example.test".to_string(),
                attributes: HashMap::new(),
            });

        let store = SnapshotStore::new(MemoryStorage::new());
        backup_topics(&source, &store).await.unwrap();

        let records: Vec<SubscriptionRecord> = store.read(SnapshotFile::Subscriptions).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic_arn, topic);
        assert_eq!(records[0].dlq_arn, None);
    }
}
