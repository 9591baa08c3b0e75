//! Where accepted uploads are written: local disk or an S3 bucket.

use crate::error::AppError;
use crate::settings::{Settings, UploadBackend};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Write `body` under `key` (a relative, slash-separated path).
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), AppError>;
}

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let rel = Path::new(key);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(AppError::Storage(format!("invalid key: {}", key)));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl UploadStore for LocalStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| AppError::Storage(format!("{}: {}", dir.display(), e)))?;
        }
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), bytes = body.len(), "stored upload");
        Ok(())
    }
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Credentials and region come from the standard AWS environment/profile chain.
    pub async fn from_env(bucket: String) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        S3Store {
            client: aws_sdk_s3::Client::new(&config),
            bucket,
        }
    }
}

#[async_trait]
impl UploadStore for S3Store {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), AppError> {
        let len = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("s3 put {}: {}", key, e)))?;
        tracing::debug!(bucket = %self.bucket, key, bytes = len, "stored upload");
        Ok(())
    }
}

/// Store selected by `MEDCMS_UPLOAD_BACKEND`.
pub async fn build_store(settings: &Settings) -> Arc<dyn UploadStore> {
    match &settings.upload_backend {
        UploadBackend::Local { root } => Arc::new(LocalStore::new(root.clone())),
        UploadBackend::S3 { bucket } => Arc::new(S3Store::from_env(bucket.clone()).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_store_writes_nested_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(dir.path());
        store
            .put("posts/thumbnail/a.png", Bytes::from_static(b"png"), "image/png")
            .await
            .expect("put");
        let written = std::fs::read(dir.path().join("posts/thumbnail/a.png")).expect("read back");
        assert_eq!(written, b"png");
    }

    #[tokio::test]
    async fn local_store_refuses_escaping_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(dir.path());
        let err = store.put("../x.png", Bytes::new(), "image/png").await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
