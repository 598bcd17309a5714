use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A deduplicated, content-addressed original photograph.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "original_image")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Lowercase hex SHA-256 of the file bytes.
    #[sea_orm(unique)]
    pub content_hash: String,

    pub object_key: String,

    /// Size of the file in bytes.
    pub file_size: i64,

    pub mime_type: String,

    pub width: Option<i32>,
    pub height: Option<i32>,

    /// Number of staged images currently pointing at this original. Never negative.
    #[sea_orm(indexed)]
    pub reference_count: i32,

    pub created_at: DateTimeUtc,

    /// Refreshed on every reference count change; the orphan grace period is measured from it.
    #[sea_orm(indexed)]
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
