/*!
Message queue client backed by the AWS SQS SDK.
*/

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client as SqsClient;
use tracing::debug;

use super::{
    collect_pages, finish_call, read_call, retryable, FifoIds, MessageQueues, ReceivedMessage,
};
use crate::{Result, StackshotError};

/// Default page size for `ListQueues`; a next token is only returned when one is set
const DEFAULT_PAGE_SIZE: i32 = 1000;

/// SQS client pointed at the emulator
#[derive(Debug, Clone)]
pub struct SqsService {
    client: SqsClient,
    page_size: i32,
}

impl SqsService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: SqsClient::new(sdk_config),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Number of queue URLs requested per listing page
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }
}

#[async_trait]
impl MessageQueues for SqsService {
    async fn ping(&self) -> Result<()> {
        const OP: &str = "sqs.list_queues";
        let request = self.client.list_queues().max_results(1);
        read_call(OP, |_| {
            let request = request.clone();
            Box::pin(async move {
                request
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| retryable(OP, e))
            })
        })
        .await
    }

    async fn list_queue_urls(&self) -> Result<Vec<String>> {
        const OP: &str = "sqs.list_queues";
        let urls = collect_pages(|token| {
            let request = self
                .client
                .list_queues()
                .max_results(self.page_size)
                .set_next_token(token);
            async move {
                let page = read_call(OP, |_| {
                    let request = request.clone();
                    Box::pin(async move { request.send().await.map_err(|e| retryable(OP, e)) })
                })
                .await?;

                Ok::<_, StackshotError>((page.queue_urls().to_vec(), page.next_token().map(str::to_string)))
            }
        })
        .await?;

        debug!(count = urls.len(), "Listed queues");
        Ok(urls)
    }

    async fn approximate_message_count(&self, queue_url: &str) -> Result<usize> {
        const OP: &str = "sqs.get_queue_attributes";
        let request = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages);
        let output = read_call(OP, |_| {
            let request = request.clone();
            Box::pin(async move { request.send().await.map_err(|e| retryable(OP, e)) })
        })
        .await?;

        let raw = output
            .attributes()
            .and_then(|attributes| attributes.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .ok_or_else(|| {
                StackshotError::invalid_record(format!(
                    "{queue_url} did not report ApproximateNumberOfMessages"
                ))
            })?;

        raw.parse().map_err(|_| {
            StackshotError::invalid_record(format!(
                "{queue_url} reported a non-numeric message count '{raw}'"
            ))
        })
    }

    async fn receive_one(&self, queue_url: &str) -> Result<Option<ReceivedMessage>> {
        let result = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(1)
            .send()
            .await;
        let output = finish_call("sqs.receive_message", result)?;

        let Some(message) = output.messages().first() else {
            return Ok(None);
        };

        let receipt_handle = message.receipt_handle().ok_or_else(|| {
            StackshotError::invalid_record(format!(
                "message received from {queue_url} has no receipt handle"
            ))
        })?;

        Ok(Some(ReceivedMessage {
            body: message.body().unwrap_or_default().to_string(),
            receipt_handle: receipt_handle.to_string(),
        }))
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        let result = self
            .client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await;

        finish_call("sqs.delete_message", result).map(|_| ())
    }

    async fn create_queue(&self, name: &str, fifo: bool) -> Result<String> {
        let mut request = self.client.create_queue().queue_name(name);
        if fifo {
            request = request
                .attributes(QueueAttributeName::FifoQueue, "true")
                .attributes(QueueAttributeName::ContentBasedDeduplication, "true");
        }

        let output = finish_call("sqs.create_queue", request.send().await)?;
        output.queue_url().map(str::to_string).ok_or_else(|| {
            StackshotError::invalid_record(format!("create_queue for '{name}' returned no URL"))
        })
    }

    async fn send_message(
        &self,
        queue_url: &str,
        body: &str,
        fifo: Option<FifoIds>,
    ) -> Result<()> {
        let (group_id, deduplication_id) = match fifo {
            Some(ids) => (Some(ids.group_id), Some(ids.deduplication_id)),
            None => (None, None),
        };

        let result = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .set_message_group_id(group_id)
            .set_message_deduplication_id(deduplication_id)
            .send()
            .await;

        finish_call("sqs.send_message", result).map(|_| ())
    }
}
