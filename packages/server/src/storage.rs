use std::path::PathBuf;
use std::sync::Arc;

use common::storage::filesystem::FilesystemObjectStore;
use common::storage::memory::MemoryObjectStore;
use common::storage::{ObjectStore, StorageError};
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

/// Build the object store selected by `storage.backend`.
pub async fn build_object_store(
    config: &StorageConfig,
) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::Filesystem => Arc::new(
            FilesystemObjectStore::new(PathBuf::from(&config.path), config.max_object_size)
                .await?,
        ),
        StorageBackend::Memory => Arc::new(MemoryObjectStore::new()),
        StorageBackend::S3 => build_s3(config)?,
    };

    info!(backend = store.backend_name(), "Object store ready");
    Ok(store)
}

#[cfg(feature = "object-storage")]
fn build_s3(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    use common::storage::s3::S3ObjectStore;

    if config.s3.bucket.is_empty() {
        return Err(StorageError::Backend("storage.s3.bucket is not set".into()));
    }
    Ok(Arc::new(S3ObjectStore::new(
        &config.s3,
        config.max_object_size,
    )?))
}

#[cfg(not(feature = "object-storage"))]
fn build_s3(_config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    Err(StorageError::Unsupported("s3 (built without object-storage)"))
}
