use async_trait::async_trait;
use aws_sdk_s3 as s3;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};
use uuid::Uuid;

use crate::models::CourseImage;

/// UploadError
///
/// Any upstream object-store failure. Carried as a plain message: callers map
/// it to the 502 boundary error; the detail goes to the log, not the client.
#[derive(Debug, thiserror::Error)]
#[error("asset store error: {0}")]
pub struct UploadError(pub String);

// 1. AssetStore Contract
/// AssetStore
///
/// The abstract contract for the external object-storage layer holding course
/// images. This trait lets us swap the concrete implementation, from the real
/// S3 client (S3AssetStore) in production to the in-memory MockAssetStore in
/// tests, without affecting the calling handlers.
///
/// The coordinator owns only the binary objects. Course metadata and the
/// decision of *when* an old object is discarded belong to the caller; the
/// contract merely guarantees that `store` never clobbers an existing object
/// (fresh UUID keys) and that `discard` is safe to treat as best-effort.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Ensures the configured bucket exists. Used in the `Env::Local` setup
    /// to automatically provision the bucket in MinIO. No-op in production.
    async fn ensure_bucket(&self);

    /// Uploads a new object and returns its reference. The key is derived
    /// from a fresh UUID plus the sanitized file extension, so concurrent
    /// stores cannot collide.
    async fn store(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<CourseImage, UploadError>;

    /// Stores the replacement object first and returns the new reference.
    /// The old object is NOT touched here: the caller discards it only after
    /// the owning record write has committed, so a failed upload can never
    /// leave the record without a valid image.
    async fn replace(
        &self,
        _old_asset_id: &str,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<CourseImage, UploadError> {
        self.store(filename, content_type, bytes).await
    }

    /// Best-effort delete. Callers log failures and move on: an orphaned
    /// object is a cheap leak, a blocked record mutation is not.
    async fn discard(&self, asset_id: &str) -> Result<(), UploadError>;
}

/// AssetState
///
/// The concrete type used to share the asset store across the application state.
pub type AssetState = Arc<dyn AssetStore>;

// 2. The Real Implementation (S3/MinIO)
/// S3AssetStore
///
/// The concrete implementation using the AWS SDK for S3. S3 compatibility
/// means this client transparently handles both the Dockerized MinIO instance
/// locally and a managed S3-compatible store in production.
///
/// `force_path_style(true)` is required for MinIO-style gateways, and it also
/// makes the public object URL a simple `{endpoint}/{bucket}/{key}` join.
#[derive(Clone)]
pub struct S3AssetStore {
    client: s3::Client,
    endpoint: String,
    bucket_name: String,
}

impl S3AssetStore {
    /// new
    ///
    /// Constructs the S3 client using credentials and configuration from AppConfig.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key), required
            // for MinIO and S3-compatible gateways.
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket_name: bucket.to_string(),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket_name, key)
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    /// ensure_bucket
    ///
    /// Calls the S3 CreateBucket API. S3 APIs are idempotent, so this only
    /// creates the bucket if it does not already exist. Safe at startup.
    async fn ensure_bucket(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    async fn store(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<CourseImage, UploadError> {
        let key = object_key(filename);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(s3::primitives::ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| UploadError(e.to_string()))?;

        Ok(CourseImage {
            url: self.public_url(&key),
            asset_id: key,
        })
    }

    async fn discard(&self, asset_id: &str) -> Result<(), UploadError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(asset_id)
            .send()
            .await
            .map_err(|e| UploadError(e.to_string()))?;
        Ok(())
    }
}

/// object_key
///
/// Builds a unique object key under the `courses/` prefix: a fresh UUID plus
/// the sanitized extension of the uploaded filename. The UUID guarantees
/// uniqueness; the extension survives purely for operator convenience.
fn object_key(filename: &str) -> String {
    let extension = sanitize_key(filename)
        .rsplit('.')
        .next()
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .unwrap_or("bin")
        .to_ascii_lowercase();
    format!("courses/{}.{}", Uuid::new_v4(), extension)
}

/// sanitize_key
///
/// Utility function to prevent path traversal attacks by removing directory
/// navigation components (e.g., `..`, `.`) from a user-provided name.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Tests)
/// MockAssetStore
///
/// In-memory implementation of `AssetStore` used exclusively for unit and
/// integration testing. It records every store and discard so tests can
/// assert the asset/record ordering protocol without a network connection.
pub struct MockAssetStore {
    /// When true, store/replace return a simulated upstream failure.
    pub fail_store: bool,
    /// When true, discard returns a simulated upstream failure.
    pub fail_discard: bool,
    counter: AtomicU64,
    stored: Mutex<Vec<String>>,
    discarded: Mutex<Vec<String>>,
}

impl MockAssetStore {
    pub fn new() -> Self {
        Self {
            fail_store: false,
            fail_discard: false,
            counter: AtomicU64::new(0),
            stored: Mutex::new(Vec::new()),
            discarded: Mutex::new(Vec::new()),
        }
    }

    pub fn new_failing() -> Self {
        Self {
            fail_store: true,
            ..Self::new()
        }
    }

    pub fn new_failing_discard() -> Self {
        Self {
            fail_discard: true,
            ..Self::new()
        }
    }

    /// Asset ids stored so far, in order.
    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }

    /// Asset ids discarded so far, in order.
    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }
}

impl Default for MockAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetStore for MockAssetStore {
    async fn ensure_bucket(&self) {
        // No-op in mock environment.
    }

    async fn store(
        &self,
        filename: &str,
        _content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<CourseImage, UploadError> {
        if self.fail_store {
            return Err(UploadError("mock store failure".to_string()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let key = format!("courses/mock-{}-{}", n, sanitize_key(filename));
        self.stored.lock().unwrap().push(key.clone());

        Ok(CourseImage {
            url: format!("http://localhost:9000/mock-bucket/{}", key),
            asset_id: key,
        })
    }

    async fn discard(&self, asset_id: &str) -> Result<(), UploadError> {
        if self.fail_discard {
            return Err(UploadError("mock discard failure".to_string()));
        }
        self.discarded.lock().unwrap().push(asset_id.to_string());
        Ok(())
    }
}
