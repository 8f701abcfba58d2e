/*!
Snapshot records persisted between a backup run and a restore run.

Bucket names, queue URLs and topic ARNs are stored as plain string
sequences. The remaining three record types keep the field names the
snapshot files have always used, so files stay readable by other tooling.
*/

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Suffix marking a FIFO queue
pub const FIFO_SUFFIX: &str = ".fifo";

/// Receive count applied to every restored dead-letter redrive policy
pub const DLQ_MAX_RECEIVE_COUNT: u32 = 5;

/// Length of the placeholder group and deduplication ids sent to FIFO queues
pub const FIFO_PLACEHOLDER_LEN: usize = 3;

/// One object captured from a bucket
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub bucket_name: String,
    pub object_key: String,
    pub object_body: Vec<u8>,
}

/// One message drained from a queue
///
/// Receipt handles, message ids and attributes are not captured.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// URL of the queue the message was drained from
    pub queue: String,
    pub body: String,
}

/// One subscription attached to a topic
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    #[serde(rename = "topicARN")]
    pub topic_arn: String,
    /// Kept for reference only; restore is issued a new ARN
    #[serde(rename = "subARN")]
    pub subscription_arn: String,
    pub protocol: String,
    pub endpoint: String,
    #[serde(rename = "DLQARN", default, skip_serializing_if = "Option::is_none")]
    pub dlq_arn: Option<String>,
}

/// Queue name from a queue URL (its final path segment)
pub fn queue_name_from_url(queue_url: &str) -> &str {
    queue_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(queue_url)
}

/// Whether a queue name or URL denotes a FIFO queue
pub fn is_fifo_queue(name_or_url: &str) -> bool {
    name_or_url.ends_with(FIFO_SUFFIX)
}

/// Topic name from a topic ARN (its final colon-separated segment)
pub fn topic_name_from_arn(topic_arn: &str) -> &str {
    topic_arn.rsplit(':').next().unwrap_or(topic_arn)
}

/// Redrive policy attribute value routing failures to `dlq_arn`
pub fn redrive_policy(dlq_arn: &str) -> String {
    serde_json::json!({
        "deadLetterTargetArn": dlq_arn,
        "maxReceiveCount": DLQ_MAX_RECEIVE_COUNT.to_string(),
    })
    .to_string()
}

/// Dead-letter target from a `RedrivePolicy` attribute value
///
/// Returns `None` for empty or unparseable policies.
pub fn dead_letter_target(policy: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(policy).ok()?;
    value
        .get("deadLetterTargetArn")
        .and_then(serde_json::Value::as_str)
        .filter(|arn| !arn.is_empty())
        .map(str::to_string)
}

/// Random ASCII letters, used as FIFO group and deduplication placeholders
pub fn random_letters<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    (0..len)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}
