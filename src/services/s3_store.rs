//! S3 object store.
//!
//! Credentials come from the standard AWS chain (env vars,
//! `~/.aws/credentials`, instance role). Every upload lives in one bucket
//! under its synthesized key.

use crate::services::object_store::{ObjectStore, ObjectStoreError, ObjectStoreResult};
use async_trait::async_trait;
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};
use bytes::Bytes;
use tracing::{debug, info};

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Load shared AWS config for `region` and build the S3 client.
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        force_path_style: bool,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()));
        if let Some(endpoint) = endpoint_url.as_deref() {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(force_path_style)
            .build();

        info!(bucket = %bucket, region = %region, "S3 object store initialized");
        Self::from_client(Client::from_conf(s3_config), bucket)
    }

    pub fn from_client(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Location recorded for `key`: `<bucket>/<key>`.
    pub fn location(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectStoreResult<String> {
        debug!("S3 put_object: bucket={} key={}", self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| ObjectStoreError::unavailable("put", DisplayErrorContext(&err)))?;

        Ok(self.location(key))
    }

    async fn remove(&self, key: &str) -> ObjectStoreResult<()> {
        debug!("S3 delete_object: bucket={} key={}", self.bucket, key);

        // delete_object succeeds for keys that do not exist.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| ObjectStoreError::unavailable("remove", DisplayErrorContext(&err)))?;

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}
