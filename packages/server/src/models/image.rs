use chrono::{DateTime, Utc};
use common::StagedImageStatus;
use serde::Serialize;
use uuid::Uuid;

use crate::entity::staged_image;
use crate::staged::CreatedStagedImage;

/// A staged image as returned to clients.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StagedImageResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = 42)]
    pub project_id: i32,
    /// Null for legacy rows created before originals were deduplicated.
    pub original_image_id: Option<Uuid>,
    #[schema(example = "originals/ab/cdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789")]
    pub original_key: String,
    #[schema(example = "queued")]
    pub status: StagedImageStatus,
    pub stored_key: Option<String>,
    pub error_message: Option<String>,
    #[schema(example = "2025-09-01T08:00:00Z")]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2025-09-01T08:00:00Z")]
    pub updated_at: DateTime<Utc>,
}

impl From<staged_image::Model> for StagedImageResponse {
    fn from(m: staged_image::Model) -> Self {
        Self {
            id: m.id,
            project_id: m.project_id,
            original_image_id: m.original_image_id,
            original_key: m.original_key,
            status: m.status,
            stored_key: m.stored_key,
            error_message: m.error_message,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Result of uploading a photograph to a project.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadImageResponse {
    pub image: StagedImageResponse,
    /// Lowercase hex SHA-256 of the uploaded bytes.
    #[schema(example = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")]
    pub content_hash: String,
    /// References now held on the original, including this one.
    #[schema(example = 2)]
    pub reference_count: i32,
    /// `true` when identical bytes were already stored and no upload happened.
    pub deduplicated: bool,
}

impl From<CreatedStagedImage> for UploadImageResponse {
    fn from(created: CreatedStagedImage) -> Self {
        Self {
            content_hash: created.original.content_hash,
            reference_count: created.original.reference_count,
            deduplicated: created.deduplicated,
            image: created.image.into(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeleteImageResponse {
    /// `true` when this was the last reference and the original was removed.
    pub original_deleted: bool,
}
