use std::sync::Arc;
use std::time::Duration;

use common::storage::{ContentHash, ObjectStore};
use sea_orm::DatabaseConnection;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::entity::original_image;
use crate::error::ImageError;

use super::repository::{NewOriginalImage, OriginalImageRepository, OriginalImageStats};

/// Bytes and metadata of an incoming original upload.
#[derive(Debug, Clone, Copy)]
pub struct OriginalUpload<'a> {
    pub data: &'a [u8],
    pub mime_type: &'a str,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Result of storing an upload through the dedup path.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub image: original_image::Model,
    /// `true` when an existing original was reused and no object was uploaded.
    pub deduplicated: bool,
}

/// Deduplication, reference counting and cleanup rules for originals.
#[derive(Clone)]
pub struct OriginalImageService {
    db: DatabaseConnection,
    store: Arc<dyn ObjectStore>,
}

impl OriginalImageService {
    pub fn new(db: DatabaseConnection, store: Arc<dyn ObjectStore>) -> Self {
        Self { db, store }
    }

    fn repo(&self) -> OriginalImageRepository<'_, DatabaseConnection> {
        OriginalImageRepository::new(&self.db)
    }

    pub async fn get(&self, id: Uuid) -> Result<original_image::Model, ImageError> {
        self.repo().get_by_id(id).await
    }

    pub async fn get_by_hash(&self, hash: &ContentHash) -> Result<original_image::Model, ImageError> {
        self.repo().get_by_hash(hash).await
    }

    /// Store an original exactly once per content hash.
    ///
    /// A hit takes another reference and skips the upload. A miss uploads the
    /// bytes and creates the row with one reference.
    #[instrument(skip(self, upload), fields(size = upload.data.len()))]
    pub async fn ingest(&self, upload: OriginalUpload<'_>) -> Result<IngestOutcome, ImageError> {
        let hash = ContentHash::compute(upload.data);
        let repo = self.repo();

        match repo.get_by_hash(&hash).await {
            Ok(existing) => return self.take_reference(existing, upload.data).await,
            Err(ImageError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let object_key = hash.original_key();
        self.store.put(&object_key, upload.data).await?;

        let created = repo
            .create(NewOriginalImage {
                content_hash: hash,
                object_key,
                file_size: upload.data.len() as i64,
                mime_type: upload.mime_type.to_string(),
                width: upload.width,
                height: upload.height,
            })
            .await;

        match created {
            Ok(image) => {
                info!(id = %image.id, hash = %hash, "Stored new original");
                Ok(IngestOutcome {
                    image,
                    deduplicated: false,
                })
            }
            Err(ImageError::AlreadyExists(_)) => {
                // A concurrent upload of the same bytes won the insert.
                debug!(hash = %hash, "Lost create race, reusing existing original");
                let existing = repo.get_by_hash(&hash).await?;
                self.take_reference(existing, upload.data).await
            }
            Err(e) => Err(e),
        }
    }

    async fn take_reference(
        &self,
        existing: original_image::Model,
        data: &[u8],
    ) -> Result<IngestOutcome, ImageError> {
        // A zero-count row may be left over from an interrupted cascade whose
        // object delete went through; restore the bytes before reusing it.
        if existing.reference_count == 0 && !self.store.exists(&existing.object_key).await? {
            warn!(id = %existing.id, key = %existing.object_key, "Re-uploading missing object for orphaned original");
            self.store.put(&existing.object_key, data).await?;
        }

        let repo = self.repo();
        repo.increment_reference(existing.id).await?;
        let image = repo.get_by_id(existing.id).await?;
        debug!(id = %image.id, references = image.reference_count, "Deduplicated original");

        Ok(IngestOutcome {
            image,
            deduplicated: true,
        })
    }

    /// Take an extra reference on an existing original.
    pub async fn add_reference(&self, id: Uuid) -> Result<(), ImageError> {
        self.repo().increment_reference(id).await
    }

    /// Release one reference and physically delete the original when it was the last one.
    ///
    /// The object-store delete is best-effort: a stray object is recoverable,
    /// a dangling row is not. The row delete is authoritative and its failure
    /// is returned to the caller. Returns whether the original was deleted.
    #[instrument(skip(self))]
    pub async fn decrement_reference_and_cleanup(&self, id: Uuid) -> Result<bool, ImageError> {
        let repo = self.repo();
        let image = repo.get_by_id(id).await?;

        repo.decrement_reference(id).await?;

        if image.reference_count > 1 {
            return Ok(false);
        }

        if let Err(e) = self.store.delete(&image.object_key).await {
            warn!(
                id = %id,
                key = %image.object_key,
                error = %e,
                "Failed to delete original object, leaving it for the storage sweep"
            );
        }

        match repo.delete(id).await {
            Ok(()) => {}
            // Already removed by a concurrent cleanup.
            Err(ImageError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        info!(id = %id, hash = %image.content_hash, "Deleted original after last reference");
        Ok(true)
    }

    /// Delete an original read earlier as unreferenced.
    ///
    /// The row goes first, through a delete conditional on a zero count, so an
    /// ingest that re-referenced it in the meantime keeps both row and object.
    /// Returns `false` when the row was re-referenced or already removed.
    pub async fn remove_orphan(&self, image: &original_image::Model) -> Result<bool, ImageError> {
        if !self.repo().delete_if_unreferenced(image.id).await? {
            debug!(id = %image.id, "Original re-referenced or already removed, keeping object");
            return Ok(false);
        }

        if let Err(e) = self.store.delete(&image.object_key).await {
            warn!(
                id = %image.id,
                key = %image.object_key,
                error = %e,
                "Failed to delete original object, leaving a stray object behind"
            );
        }
        Ok(true)
    }

    /// Sweep orphans whose last reference went away more than `older_than` ago.
    ///
    /// Each candidate is handled independently and a failure is logged. Rows
    /// re-referenced since the listing are kept. Returns the number of rows deleted.
    #[instrument(skip(self))]
    pub async fn cleanup_orphaned(&self, older_than: Duration, limit: u64) -> Result<u64, ImageError> {
        let candidates = self.repo().list_orphaned(older_than, limit).await?;

        if candidates.is_empty() {
            return Ok(0);
        }

        info!(count = candidates.len(), "Found orphaned originals");

        let mut deleted = 0u64;
        for image in &candidates {
            match self.remove_orphan(image).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(id = %image.id, error = %e, "Failed to delete orphaned original"),
            }
        }

        info!(deleted, "Orphan sweep finished");
        Ok(deleted)
    }

    pub async fn get_stats(&self) -> Result<OriginalImageStats, ImageError> {
        Ok(self.repo().stats().await?)
    }

    /// Time-limited download URL for the original's object.
    pub async fn presign_original(&self, id: Uuid, expires_in: Duration) -> Result<String, ImageError> {
        let image = self.repo().get_by_id(id).await?;
        Ok(self.store.presign(&image.object_key, expires_in).await?)
    }
}
