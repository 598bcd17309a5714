use std::time::Duration;

use async_trait::async_trait;

use super::error::StorageError;

/// Key-addressed object storage used for originals and staged outputs.
///
/// Keys are `/`-separated relative paths such as `originals/ab/cdef…`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs and error messages.
    fn backend_name(&self) -> &'static str;

    /// Store `data` under `key`, replacing any previous object.
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Retrieve all bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    /// Deleting an absent key is never an error.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Produce a time-limited GET URL for `key`.
    async fn presign(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        let _ = (key, expires_in);
        Err(StorageError::Unsupported(self.backend_name()))
    }
}
