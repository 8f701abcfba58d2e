/*!
Service connector for the emulator endpoint.
*/

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::{Credentials, Region};
use std::time::Duration;
use tracing::{error, info};

use super::{Connector, MessageQueues, ObjectStorage, S3Service, Service, SnsService, SqsService, Topics};
use crate::config::EmulatorConfig;
use crate::{Result, StackshotError};

/// Builds SDK clients bound to the configured endpoint and region
///
/// All three clients share one SDK configuration. Each client is probed with
/// a cheap listing call before it is handed out, so a stopped emulator shows
/// up as a connection error rather than a failure halfway through a step.
///
/// # Credentials
/// The standard AWS provider chain is used when `AWS_ACCESS_KEY_ID` is set.
/// Otherwise static `test`/`test` credentials are supplied, which the
/// emulator accepts.
#[derive(Debug, Clone)]
pub struct AwsConnector {
    config: EmulatorConfig,
    sdk_config: SdkConfig,
    page_size: Option<i32>,
}

impl AwsConnector {
    /// Validate `config` and load the shared SDK configuration
    pub async fn new(config: EmulatorConfig) -> Result<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url.clone())
            .region(Region::new(config.region.clone()))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(Duration::from_secs(3))
                    .build(),
            );

        if std::env::var_os("AWS_ACCESS_KEY_ID").is_none() {
            loader = loader.credentials_provider(Credentials::new(
                "test",
                "test",
                None,
                None,
                "stackshot-emulator",
            ));
        }

        let sdk_config = loader.load().await;

        info!(
            endpoint = %config.endpoint_url,
            region = %config.region,
            "Loaded emulator client configuration"
        );

        Ok(Self {
            config,
            sdk_config,
            page_size: None,
        })
    }

    /// Cap listing page sizes where the service accepts one
    ///
    /// Listings are still followed to the last page; this only changes how
    /// many requests that takes.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// The configuration this connector was built from
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }
}

fn probe(service: Service, result: Result<()>) -> Result<()> {
    result.map_err(|e| {
        error!(service = %service, error = %e, "Unable to reach emulator service - make sure everything is running");
        StackshotError::connection(service, e.to_string())
    })
}

#[async_trait]
impl Connector for AwsConnector {
    async fn object_storage(&self) -> Result<Box<dyn ObjectStorage>> {
        let mut client = S3Service::new(&self.sdk_config, &self.config);
        if let Some(page_size) = self.page_size {
            client = client.with_page_size(page_size);
        }
        probe(Service::ObjectStorage, client.ping().await)?;
        Ok(Box::new(client))
    }

    async fn queues(&self) -> Result<Box<dyn MessageQueues>> {
        let mut client = SqsService::new(&self.sdk_config);
        if let Some(page_size) = self.page_size {
            client = client.with_page_size(page_size);
        }
        probe(Service::Queues, client.ping().await)?;
        Ok(Box::new(client))
    }

    async fn topics(&self) -> Result<Box<dyn Topics>> {
        let client = SnsService::new(&self.sdk_config);
        probe(Service::Topics, client.ping().await)?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connector_rejects_invalid_config() {
        let config = EmulatorConfig::default().with_endpoint_url("localhost");
        let result = AwsConnector::new(config).await;
        assert!(matches!(result, Err(StackshotError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_connection_error() {
        // Port 9 (discard) on loopback is not expected to run an emulator
        let config = EmulatorConfig::default().with_endpoint_url("http://127.0.0.1:9");
        let connector = AwsConnector::new(config).await.unwrap();

        match connector.queues().await {
            Err(StackshotError::Connection { service, .. }) => assert_eq!(service, Service::Queues),
            Err(other) => panic!("expected connection error, got {other:?}"),
            Ok(_) => panic!("expected connection error, got a client"),
        }
    }
}
