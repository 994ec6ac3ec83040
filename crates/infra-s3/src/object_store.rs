// S3 ObjectStore Implementation

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use baler_core::port::{ObjectStore, StoreError};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn not_found(bucket: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

fn request_error(err: impl std::error::Error) -> StoreError {
    StoreError::Request(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&self, bucket: &str, key: &str) -> Result<u64, StoreError> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    not_found(bucket, key)
                } else {
                    request_error(service_err)
                }
            })?;

        Ok(output.content_length().unwrap_or(0).max(0) as u64)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    not_found(bucket, key)
                } else {
                    request_error(service_err)
                }
            })?;

        let body = output.body.collect().await.map_err(request_error)?;
        Ok(body.into_bytes().to_vec())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|err| request_error(err.into_service_error()))?;

        debug!(bucket = %bucket, key = %key, size, "Uploaded object");
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl_secs: u64,
    ) -> Result<String, StoreError> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(ttl_secs))
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| request_error(err.into_service_error()))?;

        Ok(presigned.uri().to_string())
    }
}
