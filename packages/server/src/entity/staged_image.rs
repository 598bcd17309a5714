use common::StagedImageStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A staged image derived from an original.
///
/// Rows are soft-deleted through `deleted_at` and kept for usage accounting.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "staged_image")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub project_id: i32,

    /// NULL for legacy rows uploaded before originals were deduplicated.
    #[sea_orm(indexed)]
    pub original_image_id: Option<Uuid>,

    /// Purposefully denormalized so reconciliation can check storage without a JOIN.
    pub original_key: String,

    #[sea_orm(indexed)]
    pub status: StagedImageStatus,

    /// Location of the staged output, set once the image is ready.
    pub stored_key: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub error_message: Option<String>,

    #[sea_orm(indexed)]
    pub deleted_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
