/*!
Pub/sub client backed by the AWS SNS SDK.
*/

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::Client as SnsClient;
use std::collections::HashMap;
use tracing::debug;

use super::{collect_pages, finish_call, read_call, retryable, SubscriptionSummary, Topics};
use crate::{Result, StackshotError};

/// SNS client pointed at the emulator
///
/// SNS listings have a fixed service-side page size of 100.
#[derive(Debug, Clone)]
pub struct SnsService {
    client: SnsClient,
}

impl SnsService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: SnsClient::new(sdk_config),
        }
    }
}

#[async_trait]
impl Topics for SnsService {
    async fn ping(&self) -> Result<()> {
        const OP: &str = "sns.list_topics";
        let request = self.client.list_topics();
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

    async fn list_topic_arns(&self) -> Result<Vec<String>> {
        const OP: &str = "sns.list_topics";
        let arns = collect_pages(|token| {
            let request = self.client.list_topics().set_next_token(token);
            async move {
                let page = read_call(OP, |_| {
                    let request = request.clone();
                    Box::pin(async move { request.send().await.map_err(|e| retryable(OP, e)) })
                })
                .await?;

                let arns: Vec<String> = page
                    .topics()
                    .iter()
                    .filter_map(|topic| topic.topic_arn())
                    .map(str::to_string)
                    .collect();
                Ok::<_, StackshotError>((arns, page.next_token().map(str::to_string)))
            }
        })
        .await?;

        debug!(count = arns.len(), "Listed topics");
        Ok(arns)
    }

    async fn list_subscriptions(&self, topic_arn: &str) -> Result<Vec<SubscriptionSummary>> {
        const OP: &str = "sns.list_subscriptions_by_topic";
        let subscriptions = collect_pages(|token| {
            let request = self
                .client
                .list_subscriptions_by_topic()
                .topic_arn(topic_arn)
                .set_next_token(token);
            async move {
                let page = read_call(OP, |_| {
                    let request = request.clone();
                    Box::pin(async move { request.send().await.map_err(|e| retryable(OP, e)) })
                })
                .await?;

                let subscriptions: Vec<SubscriptionSummary> = page
                    .subscriptions()
                    .iter()
                    .map(|subscription| SubscriptionSummary {
                        subscription_arn: subscription
                            .subscription_arn()
                            .unwrap_or_default()
                            .to_string(),
                        protocol: subscription.protocol().unwrap_or_default().to_string(),
                        endpoint: subscription.endpoint().unwrap_or_default().to_string(),
                    })
                    .collect();
                Ok::<_, StackshotError>((subscriptions, page.next_token().map(str::to_string)))
            }
        })
        .await?;

        debug!(topic_arn = %topic_arn, count = subscriptions.len(), "Listed subscriptions");
        Ok(subscriptions)
    }

    async fn subscription_attributes(
        &self,
        subscription_arn: &str,
    ) -> Result<HashMap<String, String>> {
        const OP: &str = "sns.get_subscription_attributes";
        let request = self
            .client
            .get_subscription_attributes()
            .subscription_arn(subscription_arn);
        let output = read_call(OP, |_| {
            let request = request.clone();
            Box::pin(async move { request.send().await.map_err(|e| retryable(OP, e)) })
        })
        .await?;

        Ok(output.attributes().cloned().unwrap_or_default())
    }

    async fn create_topic(&self, name: &str) -> Result<String> {
        let result = self.client.create_topic().name(name).send().await;
        let output = finish_call("sns.create_topic", result)?;

        output.topic_arn().map(str::to_string).ok_or_else(|| {
            StackshotError::invalid_record(format!("create_topic for '{name}' returned no ARN"))
        })
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String> {
        let result = self
            .client
            .subscribe()
            .topic_arn(topic_arn)
            .protocol(protocol)
            .endpoint(endpoint)
            .set_attributes((!attributes.is_empty()).then_some(attributes))
            .send()
            .await;

        let output = finish_call("sns.subscribe", result)?;
        Ok(output.subscription_arn().unwrap_or_default().to_string())
    }
}
