use crate::db::{store, DbAttachment};
use sqlx::SqliteConnection;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Copy of {} failed: {source}", path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid attachment: {0}")]
    Invalid(String),
}

/// Trait for file storage operations (allows mocking for tests)
///
/// Keys are relative paths of the form `<prefix>/<id>/<name>`.
#[async_trait::async_trait]
pub trait FileStorage: Send + Sync {
    /// Copy the bytes of `source` to the location for `key`, returning the byte count
    async fn put_file(&self, key: &Path, source: &Path) -> Result<u64, StorageError>;
    /// Remove whatever is stored for `key`
    async fn remove(&self, key: &Path) -> Result<(), StorageError>;
    /// Where the bytes for `key` live
    fn locate(&self, key: &Path) -> PathBuf;
}

/// Filesystem storage rooted at a directory (e.g. `backend/files`)
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl FileStorage for LocalFileStorage {
    async fn put_file(&self, key: &Path, source: &Path) -> Result<u64, StorageError> {
        let target = self.locate(key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = fs::copy(source, &target)
            .await
            .map_err(|e| StorageError::Copy {
                path: source.to_path_buf(),
                source: e,
            })?;

        debug!("Copied {} bytes to {}", bytes, target.display());
        Ok(bytes)
    }

    async fn remove(&self, key: &Path) -> Result<(), StorageError> {
        let target = self.locate(key);
        match fs::remove_file(&target).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        // The id directory only ever holds this one file
        if let Some(parent) = target.parent() {
            let _ = fs::remove_dir(parent).await;
        }
        Ok(())
    }

    fn locate(&self, key: &Path) -> PathBuf {
        self.root.join(key)
    }
}

/// Copies source files into storage and records them as attachments
#[derive(Clone)]
pub struct AttachmentStore {
    storage: Arc<dyn FileStorage>,
}

impl std::fmt::Debug for AttachmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentStore")
            .field("storage", &"<dyn FileStorage>")
            .finish()
    }
}

impl AttachmentStore {
    /// Store attachments under a local directory
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::from_storage(Arc::new(LocalFileStorage::new(root)))
    }

    pub fn from_storage(storage: Arc<dyn FileStorage>) -> Self {
        AttachmentStore { storage }
    }

    /// Copy `source` under `prefix` with a new id and persist the attachment record
    ///
    /// The record is only written after the copy succeeded. If the copy fails,
    /// any partially written file is removed and no record exists.
    pub async fn store_file(
        &self,
        conn: &mut SqliteConnection,
        source: &Path,
        prefix: &str,
    ) -> Result<DbAttachment, StorageError> {
        validate_prefix(prefix)?;

        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                StorageError::Invalid(format!("no usable file name in {}", source.display()))
            })?;

        let attachment = DbAttachment::new(prefix, name);
        let key = storage_key(&attachment);

        if let Err(e) = self.storage.put_file(&key, source).await {
            if let Err(cleanup) = self.storage.remove(&key).await {
                warn!("Failed to clean up {}: {}", key.display(), cleanup);
            }
            return Err(e);
        }

        if let Err(e) = store::insert_attachment(conn, &attachment).await {
            if let Err(cleanup) = self.storage.remove(&key).await {
                warn!("Failed to clean up {}: {}", key.display(), cleanup);
            }
            return Err(e.into());
        }

        info!(
            "Stored attachment {} ({}/{})",
            attachment.id, attachment.prefix, attachment.name
        );
        Ok(attachment)
    }

    /// Location of an attachment's bytes
    pub fn resolve(&self, attachment: &DbAttachment) -> PathBuf {
        self.storage.locate(&storage_key(attachment))
    }
}

fn storage_key(attachment: &DbAttachment) -> PathBuf {
    Path::new(&attachment.prefix)
        .join(&attachment.id)
        .join(&attachment.name)
}

/// A prefix must be exactly one normal path component (a subject name)
fn validate_prefix(prefix: &str) -> Result<(), StorageError> {
    let mut components = Path::new(prefix).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StorageError::Invalid(format!(
            "prefix '{}' is not a single directory name",
            prefix
        ))),
    }
}
