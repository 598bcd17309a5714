use chrono::Utc;
use common::StagedImageStatus;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::{info, instrument, warn};

use crate::entity::{original_image, staged_image};
use crate::error::ImageError;
use crate::originals::{OriginalImageService, OriginalUpload};

/// A freshly queued staged image and the original it points at.
#[derive(Debug, Clone)]
pub struct CreatedStagedImage {
    pub image: staged_image::Model,
    pub original: original_image::Model,
    /// `true` when the original bytes were already stored.
    pub deduplicated: bool,
}

/// Lifecycle of staged images: creation, status transitions and soft deletion.
#[derive(Clone)]
pub struct StagedImageService {
    db: DatabaseConnection,
    originals: OriginalImageService,
}

impl StagedImageService {
    pub fn new(db: DatabaseConnection, originals: OriginalImageService) -> Self {
        Self { db, originals }
    }

    /// Store the uploaded original (deduplicated) and queue a staged image for it.
    #[instrument(skip(self, upload), fields(size = upload.data.len()))]
    pub async fn create_from_upload(
        &self,
        project_id: i32,
        upload: OriginalUpload<'_>,
    ) -> Result<CreatedStagedImage, ImageError> {
        let outcome = self.originals.ingest(upload).await?;
        let now = Utc::now();

        let model = staged_image::ActiveModel {
            project_id: Set(project_id),
            original_image_id: Set(Some(outcome.image.id)),
            original_key: Set(outcome.image.object_key.clone()),
            status: Set(StagedImageStatus::Queued),
            stored_key: Set(None),
            error_message: Set(None),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let image = match model.insert(&self.db).await {
            Ok(image) => image,
            Err(e) => {
                // Give back the reference taken by ingest so the count stays truthful.
                if let Err(release_err) = self
                    .originals
                    .decrement_reference_and_cleanup(outcome.image.id)
                    .await
                {
                    warn!(
                        original_id = %outcome.image.id,
                        error = %release_err,
                        "Failed to release original after staged insert failure"
                    );
                }
                return Err(e.into());
            }
        };

        info!(
            id = image.id,
            project_id,
            original_id = %outcome.image.id,
            deduplicated = outcome.deduplicated,
            "Queued staged image"
        );

        Ok(CreatedStagedImage {
            image,
            original: outcome.image,
            deduplicated: outcome.deduplicated,
        })
    }

    /// Fetch a live (not soft-deleted) staged image.
    pub async fn get(&self, id: i32) -> Result<staged_image::Model, ImageError> {
        staged_image::Entity::find_by_id(id)
            .filter(staged_image::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?
            .ok_or_else(|| ImageError::NotFound(format!("staged image {id}")))
    }

    pub async fn mark_processing(&self, id: i32) -> Result<staged_image::Model, ImageError> {
        self.transition(id, StagedImageStatus::Processing, None, None)
            .await
    }

    pub async fn mark_ready(
        &self,
        id: i32,
        stored_key: &str,
    ) -> Result<staged_image::Model, ImageError> {
        self.transition(id, StagedImageStatus::Ready, Some(stored_key), None)
            .await
    }

    pub async fn mark_failed(
        &self,
        id: i32,
        message: &str,
    ) -> Result<staged_image::Model, ImageError> {
        self.transition(id, StagedImageStatus::Error, None, Some(message))
            .await
    }

    /// Apply a forward-only status change.
    ///
    /// The update is conditional on the status read beforehand, so a concurrent
    /// writer makes this call fail instead of silently overwriting.
    async fn transition(
        &self,
        id: i32,
        to: StagedImageStatus,
        stored_key: Option<&str>,
        message: Option<&str>,
    ) -> Result<staged_image::Model, ImageError> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(ImageError::InvalidTransition {
                id,
                from: current.status,
                to,
            });
        }

        let mut update = staged_image::Entity::update_many()
            .col_expr(staged_image::Column::Status, Expr::value(to))
            .col_expr(staged_image::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(key) = stored_key {
            update = update.col_expr(staged_image::Column::StoredKey, Expr::value(key));
        }
        if let Some(msg) = message {
            update = update.col_expr(staged_image::Column::ErrorMessage, Expr::value(msg));
        }

        let result = update
            .filter(staged_image::Column::Id.eq(id))
            .filter(staged_image::Column::Status.eq(current.status))
            .filter(staged_image::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            let latest = self.get(id).await?;
            return Err(ImageError::InvalidTransition {
                id,
                from: latest.status,
                to,
            });
        }

        self.get(id).await
    }

    /// Soft-delete a staged image and release its original reference.
    ///
    /// The row itself is kept for usage accounting. Returns whether the
    /// original was physically deleted as a result.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: i32) -> Result<bool, ImageError> {
        let image = self.get(id).await?;

        let result = staged_image::Entity::update_many()
            .col_expr(staged_image::Column::DeletedAt, Expr::value(Utc::now()))
            .col_expr(staged_image::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(staged_image::Column::Id.eq(id))
            .filter(staged_image::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            // Someone else deleted it between the read and the update.
            return Err(ImageError::NotFound(format!("staged image {id}")));
        }

        let Some(original_id) = image.original_image_id else {
            return Ok(false);
        };

        match self
            .originals
            .decrement_reference_and_cleanup(original_id)
            .await
        {
            Ok(deleted) => Ok(deleted),
            Err(ImageError::NotFound(_)) => {
                warn!(id, original_id = %original_id, "Staged image pointed at a missing original");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
