/*!
In-process emulator implementing every service seam, for tests.
*/

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    Connector, FifoIds, MessageQueues, ObjectStorage, ReceivedMessage, Service,
    SubscriptionSummary, Topics,
};
use crate::records::is_fifo_queue;
use crate::{Result, StackshotError};

const ACCOUNT: &str = "000000000000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub body: String,
    pub receipt_handle: String,
    pub fifo: Option<FifoIds>,
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    pub url: String,
    pub fifo: bool,
    pub messages: VecDeque<StoredMessage>,
    /// Added to the reported approximate count, to mimic a stale counter
    pub count_skew: usize,
}

#[derive(Debug, Clone)]
pub struct MemorySubscription {
    pub arn: String,
    pub protocol: String,
    pub endpoint: String,
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct MemoryTopic {
    pub arn: String,
    pub subscriptions: Vec<MemorySubscription>,
}

impl MemoryTopic {
    fn name(&self) -> &str {
        crate::records::topic_name_from_arn(&self.arn)
    }
}

#[derive(Debug, Default)]
pub struct EnvState {
    pub buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    pub queues: Vec<MemoryQueue>,
    pub topics: Vec<MemoryTopic>,
    next_id: u64,
}

impl EnvState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn queue_mut(&mut self, url: &str) -> Result<&mut MemoryQueue> {
        self.queues
            .iter_mut()
            .find(|q| q.url == url)
            .ok_or_else(|| StackshotError::service("sqs", format!("QueueDoesNotExist: {url}")))
    }

    fn topic_mut(&mut self, arn: &str) -> Result<&mut MemoryTopic> {
        self.topics
            .iter_mut()
            .find(|t| t.arn == arn)
            .ok_or_else(|| StackshotError::service("sns", format!("NotFound: {arn}")))
    }
}

/// Shared in-memory environment; clones see the same state
#[derive(Debug, Clone)]
pub struct MemoryEnvironment {
    endpoint: String,
    state: Arc<Mutex<EnvState>>,
    offline: Arc<Mutex<HashSet<Service>>>,
}

impl Default for MemoryEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::with_endpoint("http://localhost:4566")
    }

    /// Environment whose queue URLs use `endpoint` as their base
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            state: Arc::default(),
            offline: Arc::default(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, EnvState> {
        self.state.lock().unwrap()
    }

    /// Make connecting to `service` fail
    pub fn take_offline(&self, service: Service) {
        self.offline.lock().unwrap().insert(service);
    }

    fn check_online(&self, service: Service) -> Result<()> {
        if self.offline.lock().unwrap().contains(&service) {
            Err(StackshotError::connection(service, "connection refused"))
        } else {
            Ok(())
        }
    }

    // Seeding helpers

    pub fn seed_object(&self, bucket: &str, key: &str, body: &[u8]) {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body.to_vec());
    }

    pub fn seed_bucket(&self, bucket: &str) {
        self.state().buckets.entry(bucket.to_string()).or_default();
    }

    /// Create a queue holding `bodies` and return its URL
    pub fn seed_queue(&self, name: &str, bodies: &[&str]) -> String {
        let mut state = self.state();
        let url = format!("{}/{ACCOUNT}/{name}", self.endpoint);
        let mut queue = MemoryQueue {
            url: url.clone(),
            fifo: is_fifo_queue(name),
            ..Default::default()
        };
        for body in bodies {
            let id = state.next_id();
            queue.messages.push_back(StoredMessage {
                body: body.to_string(),
                receipt_handle: format!("receipt-{id}"),
                fifo: None,
            });
        }
        state.queues.push(queue);
        url
    }

    /// Create a topic and return its ARN
    pub fn seed_topic(&self, name: &str) -> String {
        let arn = format!("arn:aws:sns:us-east-1:{ACCOUNT}:{name}");
        self.state().topics.push(MemoryTopic {
            arn: arn.clone(),
            subscriptions: Vec::new(),
        });
        arn
    }

    pub fn seed_subscription(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
        attributes: &[(&str, &str)],
    ) -> String {
        let mut state = self.state();
        let arn = format!("{topic_arn}:{}", uuid::Uuid::new_v4());
        let topic = state.topic_mut(topic_arn).unwrap();
        topic.subscriptions.push(MemorySubscription {
            arn: arn.clone(),
            protocol: protocol.to_string(),
            endpoint: endpoint.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        arn
    }

    // Inspection helpers

    pub fn bucket_names(&self) -> Vec<String> {
        self.state().buckets.keys().cloned().collect()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state().buckets.get(bucket)?.get(key).cloned()
    }

    pub fn queue_bodies(&self, url: &str) -> Vec<String> {
        self.state()
            .queues
            .iter()
            .find(|q| q.url == url)
            .map(|q| q.messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn queue_urls(&self) -> Vec<String> {
        self.state().queues.iter().map(|q| q.url.clone()).collect()
    }
}

#[async_trait]
impl ObjectStorage for MemoryEnvironment {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        Ok(self.bucket_names())
    }

    async fn list_object_keys(&self, bucket: &str) -> Result<Vec<String>> {
        self.state()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .ok_or_else(|| StackshotError::service("s3.list_objects_v2", "NoSuchBucket"))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.object(bucket, key)
            .ok_or_else(|| StackshotError::service("s3.get_object", "NoSuchKey"))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.seed_bucket(bucket);
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let mut state = self.state();
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StackshotError::service("s3.put_object", "NoSuchBucket"))?;
        objects.insert(key.to_string(), body);
        Ok(())
    }
}

#[async_trait]
impl MessageQueues for MemoryEnvironment {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_queue_urls(&self) -> Result<Vec<String>> {
        Ok(self.queue_urls())
    }

    async fn approximate_message_count(&self, queue_url: &str) -> Result<usize> {
        let mut state = self.state();
        let queue = state.queue_mut(queue_url)?;
        Ok(queue.messages.len() + queue.count_skew)
    }

    async fn receive_one(&self, queue_url: &str) -> Result<Option<ReceivedMessage>> {
        let mut state = self.state();
        let queue = state.queue_mut(queue_url)?;
        // Received messages stay queued until deleted
        Ok(queue.messages.front().map(|m| ReceivedMessage {
            body: m.body.clone(),
            receipt_handle: m.receipt_handle.clone(),
        }))
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        let mut state = self.state();
        let queue = state.queue_mut(queue_url)?;
        queue.messages.retain(|m| m.receipt_handle != receipt_handle);
        Ok(())
    }

    async fn create_queue(&self, name: &str, fifo: bool) -> Result<String> {
        if is_fifo_queue(name) != fifo {
            return Err(StackshotError::service(
                "sqs.create_queue",
                "InvalidParameterValue: FIFO queue names must end in .fifo",
            ));
        }
        let url = format!("{}/{ACCOUNT}/{name}", self.endpoint);
        let mut state = self.state();
        if !state.queues.iter().any(|q| q.url == url) {
            state.queues.push(MemoryQueue {
                url: url.clone(),
                fifo,
                ..Default::default()
            });
        }
        Ok(url)
    }

    async fn send_message(
        &self,
        queue_url: &str,
        body: &str,
        fifo: Option<FifoIds>,
    ) -> Result<()> {
        let mut state = self.state();
        let id = state.next_id();
        let queue = state.queue_mut(queue_url)?;
        if queue.fifo && fifo.is_none() {
            return Err(StackshotError::service(
                "sqs.send_message",
                "MissingParameter: MessageGroupId",
            ));
        }
        queue.messages.push_back(StoredMessage {
            body: body.to_string(),
            receipt_handle: format!("receipt-{id}"),
            fifo,
        });
        Ok(())
    }
}

#[async_trait]
impl Topics for MemoryEnvironment {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_topic_arns(&self) -> Result<Vec<String>> {
        Ok(self.state().topics.iter().map(|t| t.arn.clone()).collect())
    }

    async fn list_subscriptions(&self, topic_arn: &str) -> Result<Vec<SubscriptionSummary>> {
        let mut state = self.state();
        let topic = state.topic_mut(topic_arn)?;
        Ok(topic
            .subscriptions
            .iter()
            .map(|s| SubscriptionSummary {
                subscription_arn: s.arn.clone(),
                protocol: s.protocol.clone(),
                endpoint: s.endpoint.clone(),
            })
            .collect())
    }

    async fn subscription_attributes(
        &self,
        subscription_arn: &str,
    ) -> Result<HashMap<String, String>> {
        self.state()
            .topics
            .iter()
            .flat_map(|t| t.subscriptions.iter())
            .find(|s| s.arn == subscription_arn)
            .map(|s| s.attributes.clone())
            .ok_or_else(|| StackshotError::service("sns.get_subscription_attributes", "NotFound"))
    }

    async fn create_topic(&self, name: &str) -> Result<String> {
        let exists = self.state().topics.iter().any(|t| t.name() == name);
        if exists {
            Ok(format!("arn:aws:sns:us-east-1:{ACCOUNT}:{name}"))
        } else {
            Ok(self.seed_topic(name))
        }
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String> {
        let arn = format!("{topic_arn}:{}", uuid::Uuid::new_v4());
        let mut state = self.state();
        let topic = state.topic_mut(topic_arn)?;
        topic.subscriptions.push(MemorySubscription {
            arn: arn.clone(),
            protocol: protocol.to_string(),
            endpoint: endpoint.to_string(),
            attributes,
        });
        Ok(arn)
    }
}

#[async_trait]
impl Connector for MemoryEnvironment {
    async fn object_storage(&self) -> Result<Box<dyn ObjectStorage>> {
        self.check_online(Service::ObjectStorage)?;
        Ok(Box::new(self.clone()))
    }

    async fn queues(&self) -> Result<Box<dyn MessageQueues>> {
        self.check_online(Service::Queues)?;
        Ok(Box::new(self.clone()))
    }

    async fn topics(&self) -> Result<Box<dyn Topics>> {
        self.check_online(Service::Topics)?;
        Ok(Box::new(self.clone()))
    }
}
