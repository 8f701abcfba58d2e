/*!
Seams between the backup/restore operations and the emulated cloud APIs.

Each service is reached through a narrow async trait. `AwsConnector` hands
out implementations backed by the AWS SDK, pointed at the emulator endpoint.
Listings are always followed to the last page.
*/

pub mod connector;
pub mod s3;
pub mod sns;
pub mod sqs;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_smithy_runtime_api::client::result::SdkError;
use stackshot_retry::{
    emulator_backoff_policy, permanent_error, transient_error, with_custom_backoff, BoxFuture,
    RetryError,
};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use crate::observability::record_api_call;
use crate::{Result, StackshotError};

pub use connector::AwsConnector;
pub use s3::S3Service;
pub use sns::SnsService;
pub use sqs::SqsService;

/// The three emulated services, in the order runs visit them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    ObjectStorage,
    Queues,
    Topics,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::ObjectStorage, Service::Queues, Service::Topics];
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Service::ObjectStorage => "S3",
            Service::Queues => "SQS",
            Service::Topics => "SNS",
        })
    }
}

/// Object storage calls used by backup and restore
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Cheap call proving the service answers
    async fn ping(&self) -> Result<()>;

    async fn list_buckets(&self) -> Result<Vec<String>>;

    async fn list_object_keys(&self, bucket: &str) -> Result<Vec<String>>;

    /// Full body of one object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// A message handed out by a single receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt_handle: String,
}

/// Group and deduplication ids required when sending to a FIFO queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoIds {
    pub group_id: String,
    pub deduplication_id: String,
}

/// Message queue calls used by backup and restore
#[async_trait]
pub trait MessageQueues: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn list_queue_urls(&self) -> Result<Vec<String>>;

    /// The service's eventually-consistent message count
    async fn approximate_message_count(&self, queue_url: &str) -> Result<usize>;

    /// Receive at most one message; `None` when nothing was delivered
    async fn receive_one(&self, queue_url: &str) -> Result<Option<ReceivedMessage>>;

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()>;

    /// Create a queue and return its URL
    async fn create_queue(&self, name: &str, fifo: bool) -> Result<String>;

    async fn send_message(&self, queue_url: &str, body: &str, fifo: Option<FifoIds>)
        -> Result<()>;
}

/// One entry of a topic's subscription listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSummary {
    pub subscription_arn: String,
    pub protocol: String,
    pub endpoint: String,
}

/// Pub/sub calls used by backup and restore
#[async_trait]
pub trait Topics: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn list_topic_arns(&self) -> Result<Vec<String>>;

    async fn list_subscriptions(&self, topic_arn: &str) -> Result<Vec<SubscriptionSummary>>;

    async fn subscription_attributes(
        &self,
        subscription_arn: &str,
    ) -> Result<HashMap<String, String>>;

    /// Create a topic and return its ARN
    async fn create_topic(&self, name: &str) -> Result<String>;

    /// Subscribe and return the new subscription ARN
    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String>;
}

/// Hands out one connected client per service
///
/// A returned error means the service could not be reached; callers skip
/// that service and carry on with the next.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn object_storage(&self) -> Result<Box<dyn ObjectStorage>>;

    async fn queues(&self) -> Result<Box<dyn MessageQueues>>;

    async fn topics(&self) -> Result<Box<dyn Topics>>;
}

const TRANSIENT_CODES: &[&str] = &[
    "InternalError",
    "ServiceUnavailable",
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "RequestThrottled",
];

fn is_transient<E: ProvideErrorMetadata, R>(error: &SdkError<E, R>) -> bool {
    match error {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(context) => context
            .err()
            .code()
            .map_or(false, |code| TRANSIENT_CODES.contains(&code)),
        _ => false,
    }
}

/// Render an SDK error with its full context
pub(crate) fn sdk_error<E, R>(operation: &'static str, error: SdkError<E, R>) -> StackshotError
where
    E: std::error::Error + 'static,
    R: fmt::Debug,
{
    StackshotError::service(operation, DisplayErrorContext(&error).to_string())
}

/// Classify an SDK error for the retry layer
pub(crate) fn retryable<E, R>(operation: &'static str, error: SdkError<E, R>) -> RetryError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let transient = is_transient(&error);
    let source = sdk_error(operation, error);
    if transient {
        transient_error!(operation, source)
    } else {
        permanent_error!(operation, source)
    }
}

/// Run a read-only call under the emulator backoff policy
pub(crate) async fn read_call<'a, F, T>(operation: &'static str, f: F) -> Result<T>
where
    F: FnMut(usize) -> BoxFuture<'a, T>,
{
    let result = with_custom_backoff(operation, emulator_backoff_policy(), f).await;
    record_api_call(operation, result.is_ok());

    result.map_err(|err| match err {
        RetryError::Permanent { source, .. } => match source.downcast::<StackshotError>() {
            Ok(inner) => *inner,
            Err(source) => StackshotError::service(operation, source.to_string()),
        },
        other => StackshotError::from(other),
    })
}

/// Fetch pages until one comes back without a continuation token
///
/// `fetch` receives the token of the previous page (`None` first) and
/// returns that page's items with the next token.
pub(crate) async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>)>>,
{
    let mut items = Vec::new();
    let mut token = None;

    loop {
        let (page, next) = fetch(token.take()).await?;
        items.extend(page);
        match next {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }

    Ok(items)
}

/// Finish a single-shot (mutating) call
pub(crate) fn finish_call<T, E, R>(
    operation: &'static str,
    result: std::result::Result<T, SdkError<E, R>>,
) -> Result<T>
where
    E: std::error::Error + 'static,
    R: fmt::Debug,
{
    record_api_call(operation, result.is_ok());
    result.map_err(|e| sdk_error(operation, e))
}
