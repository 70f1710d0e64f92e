//! S3 artifact store adapter.

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::time::Duration;

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::ArtifactConfig;
use crate::domain::ports::ArtifactStore;

#[derive(Clone)]
pub struct S3ArtifactStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ArtifactStore {
    pub async fn from_config(config: &ArtifactConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;

        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: config.bucket.clone(),
        }
    }

    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ControlPlaneResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ControlPlaneError::ArtifactStore(e.to_string()))?;
        Ok(())
    }

    async fn get_signed_url(&self, key: &str, ttl: Duration) -> ControlPlaneResult<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| ControlPlaneError::ArtifactStore(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| ControlPlaneError::ArtifactStore(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}
