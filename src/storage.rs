use async_trait::async_trait;
use aws_sdk_s3 as s3;
use axum::body::Bytes;
use s3::primitives::ByteStream;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Public URL prefix every stored image path starts with.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Extensions accepted for a featured image.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// UploadedFile
///
/// One file part pulled out of a multipart request, fully buffered.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    /// The client-supplied filename. Only its extension is ever used.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// A browser submits an empty file part when nothing was selected; that is "no file".
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() || self.file_name.as_deref().is_none_or(str::is_empty)
    }
}

/// Builds the unique stored file name for an upload, e.g. `3f2c...e1.png`.
///
/// The client filename contributes nothing but a lowercase, whitelisted extension.
pub fn stored_file_name(file: &UploadedFile) -> AppResult<String> {
    let extension = file
        .file_name
        .as_deref()
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .filter(|ext| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "featuredImage must be one of: {}",
                ALLOWED_IMAGE_EXTENSIONS.join(", ")
            ))
        })?;

    Ok(format!("{}.{}", Uuid::new_v4().simple(), extension))
}

/// Recovers the stored file name from a public path handed out by `store`.
pub fn stored_name_of(path: &str) -> AppResult<&str> {
    path.strip_prefix(UPLOADS_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|name| !name.is_empty() && !name.contains('/') && !name.contains(".."))
        .ok_or_else(|| AppError::Storage(format!("not an upload path: {path}")))
}

// 1. UploadStore Contract
/// UploadStore
///
/// The binary file stash. Implementations persist the bytes and hand back the stable public
/// path that gets written into `Post.featured_image`.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Persists `file` under a fresh unique name and returns its public path
    /// (`/uploads/<name>`).
    async fn store(&self, file: &UploadedFile) -> AppResult<String>;

    /// Deletes a file previously returned by `store`.
    async fn remove(&self, path: &str) -> AppResult<()>;
}

/// UploadState
///
/// The shared handle to whichever upload backend is configured.
pub type UploadState = Arc<dyn UploadStore>;

/// associate
///
/// Binds an optional upload to a post mutation. "No file" is a normal outcome (`Ok(None)`),
/// not an error, so a post can always be saved without an image.
pub async fn associate(
    store: &dyn UploadStore,
    file: Option<&UploadedFile>,
) -> AppResult<Option<String>> {
    match file {
        Some(file) if !file.is_empty() => store.store(file).await.map(Some),
        _ => Ok(None),
    }
}

/// discard
///
/// Best-effort removal of an upload whose post mutation failed. A failure here is logged and
/// swallowed; the caller is already returning the original error.
pub async fn discard(store: &dyn UploadStore, path: &str) {
    if path.is_empty() {
        return;
    }
    match store.remove(path).await {
        Ok(()) => tracing::debug!(path, "orphaned upload removed"),
        Err(e) => tracing::warn!(path, error = %e, "failed to remove orphaned upload"),
    }
}

// 2. Local Filesystem Implementation
/// LocalUploadStore
///
/// Writes uploads into a directory that the router also serves under `/uploads`.
#[derive(Clone, Debug)]
pub struct LocalUploadStore {
    root: PathBuf,
}

impl LocalUploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl UploadStore for LocalUploadStore {
    async fn store(&self, file: &UploadedFile) -> AppResult<String> {
        let name = stored_file_name(file)?;

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Storage(format!("create uploads dir: {e}")))?;

        let path = self.root.join(&name);
        fs::write(&path, &file.bytes)
            .await
            .map_err(|e| AppError::Storage(format!("write upload: {e}")))?;

        tracing::debug!(path = ?path, size = file.bytes.len(), "upload stored");
        Ok(format!("{UPLOADS_PREFIX}/{name}"))
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        let name = stored_name_of(path)?;
        fs::remove_file(self.root.join(name))
            .await
            .map_err(|e| AppError::Storage(format!("remove upload: {e}")))
    }
}

// 3. The S3 Implementation (S3/MinIO)
/// S3UploadStore
///
/// Stores uploads as objects under the `uploads/` key prefix of one bucket.
/// `force_path_style(true)` is required for MinIO.
#[derive(Clone)]
pub struct S3UploadStore {
    client: s3::Client,
    bucket_name: String,
}

impl S3UploadStore {
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
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }

    /// Creates the bucket if missing. Only called in local mode against MinIO.
    pub async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }
}

#[async_trait]
impl UploadStore for S3UploadStore {
    async fn store(&self, file: &UploadedFile) -> AppResult<String> {
        let name = stored_file_name(file)?;
        let key = format!("{}/{}", UPLOADS_PREFIX.trim_start_matches('/'), name);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(ByteStream::from(file.bytes.to_vec()));
        if let Some(content_type) = &file.content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("s3 put_object: {e}")))?;

        Ok(format!("/{key}"))
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        let key = format!(
            "{}/{}",
            UPLOADS_PREFIX.trim_start_matches('/'),
            stored_name_of(path)?
        );

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("s3 delete_object: {e}")))?;
        Ok(())
    }
}

// 4. The Mock Implementation (For Tests)
/// MockUploadStore
///
/// Records stored names in memory instead of touching disk or the network.
#[derive(Default)]
pub struct MockUploadStore {
    /// When true, every `store` call fails with a storage error.
    pub should_fail: bool,
    stored: Mutex<Vec<String>>,
}

impl MockUploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Paths handed out and not removed since, oldest first.
    pub fn stored_paths(&self) -> Vec<String> {
        self.stored
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UploadStore for MockUploadStore {
    async fn store(&self, file: &UploadedFile) -> AppResult<String> {
        if self.should_fail {
            return Err(AppError::Storage(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        let path = format!("{UPLOADS_PREFIX}/{}", stored_file_name(file)?);
        if let Ok(mut stored) = self.stored.lock() {
            stored.push(path.clone());
        }
        Ok(path)
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        let mut stored = self
            .stored
            .lock()
            .map_err(|_| AppError::Storage("mock upload store poisoned".to_string()))?;
        match stored.iter().position(|p| p == path) {
            Some(index) => {
                stored.remove(index);
                Ok(())
            }
            None => Err(AppError::Storage(format!("no such upload: {path}"))),
        }
    }
}
