//! Output storage for rendered samples.
//!
//! A small wrapper around `object_store`, which already provides S3, local
//! filesystem and in-memory backends. Samples are laid out as
//! `<training_run>/<checkpoint_stem>/<image>` so that everything rendered
//! for one checkpoint can be cleared with a single prefix delete.

mod config;

use std::path::Path as FsPath;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::ObjectStore;
use object_store::ObjectStoreExt;
use object_store::path::Path;
use sampler_core::checkpoint_stem;

pub use config::{DEFAULT_FS_ROOT, S3Config, StorageBackendConfig, StorageConfig, StorageKind};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

/// Key prefix holding every sample rendered for one checkpoint.
pub fn checkpoint_prefix(training_run: &str, checkpoint_filename: &str) -> String {
    format!(
        "{}/{}",
        training_run.trim_matches('/'),
        checkpoint_stem(checkpoint_filename)
    )
}

/// Key of one rendered sample.
pub fn sample_key(training_run: &str, checkpoint_filename: &str, image_name: &str) -> String {
    format!(
        "{}/{}",
        checkpoint_prefix(training_run, checkpoint_filename),
        image_name.trim_start_matches('/')
    )
}

#[derive(Clone)]
pub struct Storage {
    kind: StorageKind,
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl Storage {
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn kind_str(&self) -> &'static str {
        self.kind.as_str()
    }

    pub async fn new(cfg: StorageConfig) -> Result<Self, StorageError> {
        let (kind, store) = match cfg.backend {
            StorageBackendConfig::S3(s3) => (StorageKind::S3, Arc::new(build_s3(s3)?) as _),
            StorageBackendConfig::Filesystem { root } => {
                ensure_dir(&root)?;
                let fs = object_store::local::LocalFileSystem::new_with_prefix(&root)?;
                (StorageKind::Filesystem, Arc::new(fs) as _)
            }
            StorageBackendConfig::Memory => {
                let mem = object_store::memory::InMemory::new();
                (StorageKind::Memory, Arc::new(mem) as _)
            }
        };

        tracing::info!(backend = kind.as_str(), "Sample storage ready");

        Ok(Self {
            kind,
            store,
            prefix: cfg.prefix.and_then(config::non_empty),
        })
    }

    pub async fn from_env() -> Result<Self, StorageError> {
        Self::new(StorageConfig::from_env()?).await
    }

    fn root_prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
    }

    fn to_path(&self, key: &str) -> Result<Path, StorageError> {
        let key = key.trim_matches('/');
        if key.is_empty() {
            return Err(StorageError::InvalidKey(
                "object key must not be empty".to_string(),
            ));
        }

        let joined = match self.root_prefix() {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        };

        Ok(Path::from(joined))
    }

    /// Turn a stored location back into a key relative to the configured
    /// prefix.
    fn to_key(&self, location: &Path) -> String {
        let raw = location.as_ref();
        match self.root_prefix() {
            Some(prefix) => raw
                .strip_prefix(prefix)
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(raw)
                .to_string(),
            None => raw.to_string(),
        }
    }

    pub async fn put_bytes(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.to_path(key)?;
        self.store
            .put(&path, object_store::PutPayload::from(bytes))
            .await?;
        Ok(())
    }

    pub async fn get_bytes(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.to_path(key)?;
        let res = self.store.get(&path).await?;
        Ok(res.bytes().await?)
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.to_path(key)?;
        self.store.delete(&path).await?;
        Ok(())
    }

    /// Keys below `prefix`, sorted.
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let path = self.to_path(prefix)?;
        let metas: Vec<_> = self.store.list(Some(&path)).try_collect().await?;

        let mut keys: Vec<String> = metas.iter().map(|m| self.to_key(&m.location)).collect();
        keys.sort();
        Ok(keys)
    }

    /// Delete every object below `prefix` and return the removed keys.
    pub async fn clear_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let keys = self.list_prefix(prefix).await?;

        for key in &keys {
            match self.delete(key).await {
                Ok(()) => {}
                // Already gone, e.g. removed by the user in the meantime.
                Err(StorageError::ObjectStore(object_store::Error::NotFound { .. })) => {}
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(prefix, removed = keys.len(), "Cleared sample output");
        Ok(keys)
    }

    /// Remove everything previously rendered for one checkpoint.
    pub async fn clear_checkpoint_output(
        &self,
        training_run: &str,
        checkpoint_filename: &str,
    ) -> Result<Vec<String>, StorageError> {
        self.clear_prefix(&checkpoint_prefix(training_run, checkpoint_filename))
            .await
    }
}

fn ensure_dir(root: &FsPath) -> Result<(), StorageError> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

fn build_s3(cfg: S3Config) -> Result<object_store::aws::AmazonS3, StorageError> {
    let mut builder = object_store::aws::AmazonS3Builder::new()
        .with_bucket_name(cfg.bucket)
        .with_region(cfg.region)
        .with_virtual_hosted_style_request(cfg.virtual_hosted_style);

    if let Some(endpoint) = cfg.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    if cfg.allow_http {
        builder = builder.with_allow_http(true);
    }
    if let Some(access_key_id) = cfg.access_key_id {
        builder = builder.with_access_key_id(access_key_id);
    }
    if let Some(secret_access_key) = cfg.secret_access_key {
        builder = builder.with_secret_access_key(secret_access_key);
    }
    if let Some(session_token) = cfg.session_token {
        builder = builder.with_token(session_token);
    }

    Ok(builder.build()?)
}
