//! Object-storage mirror of added content.
//!
//! Each object is keyed by its CID. Writes are fire-once: the store is built
//! with retries disabled so a failing endpoint reports promptly.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, RetryConfig};

use crate::cid::ContentId;
use crate::config::S3Config;
use crate::error::S3Error;

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone)]
pub struct S3Adapter {
    bucket: String,
    inner: Arc<dyn ObjectStore>,
}

impl S3Adapter {
    /// Build an S3-compatible store (AWS, MinIO, ...) using path-style
    /// requests.
    pub fn from_config(config: &S3Config, timeout: Duration) -> Result<Self, S3Error> {
        let retry = RetryConfig {
            max_retries: 0,
            retry_timeout: timeout,
            ..Default::default()
        };
        let options = ClientOptions::new()
            .with_timeout(timeout)
            .with_connect_timeout(timeout);

        let store = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint_url)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_bucket_name(&config.bucket_name)
            .with_region(DEFAULT_REGION)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(config.endpoint_url.starts_with("http://"))
            .with_retry(retry)
            .with_client_options(options)
            .build()
            .map_err(S3Error::Setup)?;

        Ok(Self {
            bucket: config.bucket_name.clone(),
            inner: Arc::new(store),
        })
    }

    /// Wrap an existing store, e.g. `InMemory` in tests.
    pub fn with_store(bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            bucket: bucket.into(),
            inner: store,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_path(cid: &ContentId) -> ObjectPath {
        ObjectPath::from(cid.as_str())
    }

    pub async fn upload(&self, cid: &ContentId, data: Bytes) -> Result<(), S3Error> {
        let len = data.len();
        self.inner
            .put(&Self::object_path(cid), data.into())
            .await
            .map_err(|source| S3Error::Upload {
                cid: cid.clone(),
                source,
            })?;
        tracing::debug!(cid = %cid, bucket = %self.bucket, len, "uploaded object");
        Ok(())
    }

    /// Delete the object for `cid`. A missing object is not an error.
    pub async fn delete(&self, cid: &ContentId) -> Result<(), S3Error> {
        match self.inner.delete(&Self::object_path(cid)).await {
            Ok(()) => {
                tracing::debug!(cid = %cid, bucket = %self.bucket, "deleted object");
                Ok(())
            }
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(source) => Err(S3Error::Delete {
                cid: cid.clone(),
                source,
            }),
        }
    }

    pub async fn exists(&self, cid: &ContentId) -> Result<bool, S3Error> {
        match self.inner.head(&Self::object_path(cid)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(source) => Err(S3Error::Read {
                cid: cid.clone(),
                source,
            }),
        }
    }

    /// Fetch the stored copy, if any.
    pub async fn download(&self, cid: &ContentId) -> Result<Option<Bytes>, S3Error> {
        match self.inner.get(&Self::object_path(cid)).await {
            Ok(result) => result.bytes().await.map(Some).map_err(|source| S3Error::Read {
                cid: cid.clone(),
                source,
            }),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(source) => Err(S3Error::Read {
                cid: cid.clone(),
                source,
            }),
        }
    }
}
