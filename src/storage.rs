use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::config::AppConfig;

/// Blob store holding the raw bytes of every document version.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: Option<String>)
        -> Result<()>;

    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Builds a path-style client, honouring a custom endpoint (minio and friends)
    /// and static credentials when both halves are configured.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let region_provider =
            RegionProviderChain::first_try(Some(Region::new(config.aws_region.clone())))
                .or_default_provider()
                .or_else("us-east-1");

        #[allow(deprecated)]
        let mut loader = aws_config::from_env().region(region_provider);

        if let Some(endpoint) = &config.aws_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) = (
            config.aws_access_key_id.as_ref(),
            config.aws_secret_access_key.as_ref(),
        ) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static",
            ));
        }

        let shared = loader.load().await;
        let s3_config = S3ConfigBuilder::from(&shared).force_path_style(true).build();

        Ok(Self::new(
            S3Client::from_conf(s3_config),
            config.s3_bucket.clone(),
        ))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .context("failed to upload object to S3")?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("failed to download object from S3")?;

        let bytes = response
            .body
            .collect()
            .await
            .context("failed to read object stream")?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("failed to delete object from S3")?;
        Ok(())
    }
}
