/*!
Object storage client backed by the AWS S3 SDK.
*/

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client as S3Client;
use stackshot_retry::{transient_error, RetryError};
use tracing::debug;

use super::{collect_pages, finish_call, read_call, retryable, ObjectStorage};
use crate::config::EmulatorConfig;
use crate::{Result, StackshotError};

/// S3 client pointed at the emulator
///
/// Path-style addressing is forced, since the emulator does not resolve
/// virtual-hosted bucket names.
#[derive(Debug, Clone)]
pub struct S3Service {
    client: S3Client,
    location_constraint: Option<String>,
    page_size: Option<i32>,
}

impl S3Service {
    pub fn new(sdk_config: &SdkConfig, config: &EmulatorConfig) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            location_constraint: config
                .needs_location_constraint()
                .then(|| config.region.clone()),
            page_size: None,
        }
    }

    /// Cap the number of buckets or keys requested per listing page
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

#[async_trait]
impl ObjectStorage for S3Service {
    async fn ping(&self) -> Result<()> {
        const OP: &str = "s3.list_buckets";
        let request = self.client.list_buckets();
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

    async fn list_buckets(&self) -> Result<Vec<String>> {
        const OP: &str = "s3.list_buckets";
        let names = collect_pages(|token| {
            let request = self
                .client
                .list_buckets()
                .set_max_buckets(self.page_size)
                .set_continuation_token(token);
            async move {
                let page = read_call(OP, |_| {
                    let request = request.clone();
                    Box::pin(async move { request.send().await.map_err(|e| retryable(OP, e)) })
                })
                .await?;

                let names: Vec<String> = page
                    .buckets()
                    .iter()
                    .filter_map(|bucket| bucket.name())
                    .map(str::to_string)
                    .collect();
                Ok::<_, StackshotError>((names, page.continuation_token().map(str::to_string)))
            }
        })
        .await?;

        debug!(count = names.len(), "Listed buckets");
        Ok(names)
    }

    async fn list_object_keys(&self, bucket: &str) -> Result<Vec<String>> {
        const OP: &str = "s3.list_objects_v2";
        let keys = collect_pages(|token| {
            let request = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_max_keys(self.page_size)
                .set_continuation_token(token);
            async move {
                let page = read_call(OP, |_| {
                    let request = request.clone();
                    Box::pin(async move { request.send().await.map_err(|e| retryable(OP, e)) })
                })
                .await?;

                let keys: Vec<String> = page
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(str::to_string)
                    .collect();
                let next = page
                    .next_continuation_token()
                    .filter(|_| page.is_truncated().unwrap_or(false))
                    .map(str::to_string);
                Ok::<_, StackshotError>((keys, next))
            }
        })
        .await?;

        debug!(bucket = %bucket, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        const OP: &str = "s3.get_object";
        let request = self.client.get_object().bucket(bucket).key(key);

        read_call(OP, |_| {
            let request = request.clone();
            Box::pin(async move {
                let output = request.send().await.map_err(|e| retryable(OP, e))?;
                let data = output.body.collect().await.map_err(|e| {
                    transient_error!(
                        OP,
                        StackshotError::service(OP, format!("failed to read object body: {e}"))
                    )
                })?;
                Ok::<_, RetryError>(data.into_bytes().to_vec())
            })
        })
        .await
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(region) = &self.location_constraint {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region.as_str()))
                    .build(),
            );
        }

        finish_call("s3.create_bucket", request.send().await).map(|_| ())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let result = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await;

        finish_call("s3.put_object", result).map(|_| ())
    }
}
