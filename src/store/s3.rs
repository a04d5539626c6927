//! S3 object store built on aws-sdk-s3
//!
//! The SDK is async; the pipeline runs on plain worker threads. The store
//! owns a small tokio runtime and drives each request to completion with
//! `block_on`, which is safe to call from many threads at once as long as
//! none of them is itself a runtime thread.

use super::{ObjectPage, ObjectStore};
use crate::error::{StoreError, StoreResult};
use crate::types::{Meta, RemoteObject};
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, DateTime as AwsDateTime};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

/// Connection options for [`S3Store`]
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    /// Target bucket
    pub bucket: String,

    /// AWS region
    pub region: String,

    /// Custom endpoint for S3-compatible services (MinIO, Ceph, ...)
    pub endpoint_url: Option<String>,

    /// Threads for the runtime driving the SDK
    pub runtime_threads: usize,
}

impl S3StoreConfig {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint_url: None,
            runtime_threads: 4,
        }
    }
}

/// Blocking S3 client for one bucket
pub struct S3Store {
    client: Client,
    bucket: String,
    runtime: Arc<Runtime>,
}

impl S3Store {
    /// Build a client from the environment's credentials
    ///
    /// Must not be called from inside an async context.
    pub fn connect(config: &S3StoreConfig) -> StoreResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.runtime_threads.max(1))
            .thread_name("s3-client")
            .enable_all()
            .build()
            .map_err(|e| StoreError::Runtime(e.to_string()))?;

        let client = runtime.block_on(async {
            let mut loader =
                aws_config::ConfigLoader::default().region(Region::new(config.region.clone()));
            if let Some(endpoint) = &config.endpoint_url {
                loader = loader.endpoint_url(endpoint);
            }
            let sdk_config = loader.load().await;

            // Custom endpoints rarely support virtual-hosted buckets
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(config.endpoint_url.is_some())
                .build();
            Client::from_conf(s3_config)
        });

        debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint_url,
            "S3 client ready"
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            runtime: Arc::new(runtime),
        })
    }

    fn request_error(
        operation: &'static str,
        key: &str,
        err: impl std::error::Error,
    ) -> StoreError {
        StoreError::Request {
            operation,
            key: key.to_string(),
            reason: DisplayErrorContext(err).to_string(),
        }
    }
}

/// Convert an SDK timestamp to UTC, falling back to the epoch
fn to_utc(ts: Option<&AwsDateTime>) -> DateTime<Utc> {
    ts.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_default()
}

impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn head_object(&self, key: &str) -> StoreResult<Option<Meta>> {
        trace!(key = %key, "HeadObject");
        let result = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send(),
        );

        match result {
            Ok(out) => Ok(Some(Meta {
                size: out.content_length().unwrap_or_default().max(0) as u64,
                modified: to_utc(out.last_modified()),
            })),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(Self::request_error("HeadObject", key, e)),
        }
    }

    fn list_page(&self, continuation: Option<&str>) -> StoreResult<ObjectPage> {
        trace!(token = ?continuation, "ListObjectsV2");
        let out = self
            .runtime
            .block_on(
                self.client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .set_continuation_token(continuation.map(str::to_string))
                    .send(),
            )
            .map_err(|e| Self::request_error("ListObjectsV2", &self.bucket, e))?;

        let objects = out
            .contents()
            .iter()
            .filter_map(|o| {
                Some(RemoteObject {
                    key: o.key()?.to_string(),
                    modified: to_utc(o.last_modified()),
                    size: o.size().unwrap_or_default().max(0) as u64,
                })
            })
            .collect();

        let next = if out.is_truncated().unwrap_or(false) {
            out.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage { objects, next })
    }

    fn put_object(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        trace!(key = %key, bytes = data.len(), "PutObject");
        self.runtime
            .block_on(
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .body(ByteStream::from(data))
                    .send(),
            )
            .map_err(|e| Self::request_error("PutObject", key, e))?;
        Ok(())
    }

    fn get_object(&self, key: &str) -> StoreResult<Vec<u8>> {
        trace!(key = %key, "GetObject");
        self.runtime.block_on(async {
            let out = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| Self::request_error("GetObject", key, e))?;

            let body = out.body.collect().await.map_err(|e| StoreError::Body {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
            Ok::<_, StoreError>(body.into_bytes().to_vec())
        })
    }

    fn delete_object(&self, key: &str) -> StoreResult<()> {
        trace!(key = %key, "DeleteObject");
        self.runtime
            .block_on(
                self.client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send(),
            )
            .map_err(|e| Self::request_error("DeleteObject", key, e))?;
        Ok(())
    }
}
