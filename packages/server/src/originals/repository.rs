use std::time::Duration;

use chrono::Utc;
use common::storage::ContentHash;
use sea_orm::sea_query::{self, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::original_image;
use crate::error::ImageError;
use crate::utils::time::cutoff_before_now;

/// Fields supplied when a never-seen original is first stored.
#[derive(Debug, Clone)]
pub struct NewOriginalImage {
    pub content_hash: ContentHash,
    pub object_key: String,
    pub file_size: i64,
    pub mime_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Aggregate figures over the `original_image` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OriginalImageStats {
    pub total_count: u64,
    pub total_size: u64,
    /// Rows with a zero reference count still awaiting physical deletion.
    pub orphaned_count: u64,
    pub orphaned_size: u64,
    /// Mean reference count across all rows; 0 for an empty table.
    pub avg_references: f64,
}

/// Data access for `original_image`. Holds no business rules.
pub struct OriginalImageRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> OriginalImageRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Insert a new original with a reference count of 1.
    ///
    /// The unique index on `content_hash` turns a concurrent duplicate into
    /// `ImageError::AlreadyExists`.
    pub async fn create(&self, new: NewOriginalImage) -> Result<original_image::Model, ImageError> {
        let now = Utc::now();
        let hash = new.content_hash.to_hex();
        let model = original_image::ActiveModel {
            id: Set(Uuid::now_v7()),
            content_hash: Set(hash.clone()),
            object_key: Set(new.object_key),
            file_size: Set(new.file_size),
            mime_type: Set(new.mime_type),
            width: Set(new.width),
            height: Set(new.height),
            reference_count: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match model.insert(self.conn).await {
            Ok(inserted) => Ok(inserted),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(ImageError::AlreadyExists(hash))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<original_image::Model, ImageError> {
        original_image::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or_else(|| ImageError::NotFound(format!("original image {id}")))
    }

    pub async fn get_by_hash(
        &self,
        hash: &ContentHash,
    ) -> Result<original_image::Model, ImageError> {
        original_image::Entity::find()
            .filter(original_image::Column::ContentHash.eq(hash.to_hex()))
            .one(self.conn)
            .await?
            .ok_or_else(|| ImageError::NotFound(format!("original image with hash {hash}")))
    }

    /// Atomically add one reference. Executed as a single `UPDATE`, never read-modify-write.
    pub async fn increment_reference(&self, id: Uuid) -> Result<(), ImageError> {
        let result = original_image::Entity::update_many()
            .col_expr(
                original_image::Column::ReferenceCount,
                sea_query::ExprTrait::add(Expr::col(original_image::Column::ReferenceCount), 1),
            )
            .col_expr(original_image::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(original_image::Column::Id.eq(id))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ImageError::NotFound(format!("original image {id}")));
        }
        Ok(())
    }

    /// Atomically drop one reference, clamped at zero.
    ///
    /// Decrementing a row that is already at zero is a no-op rather than an error.
    pub async fn decrement_reference(&self, id: Uuid) -> Result<(), ImageError> {
        let result = original_image::Entity::update_many()
            .col_expr(
                original_image::Column::ReferenceCount,
                sea_query::ExprTrait::sub(Expr::col(original_image::Column::ReferenceCount), 1),
            )
            .col_expr(original_image::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(original_image::Column::Id.eq(id))
            .filter(original_image::Column::ReferenceCount.gt(0))
            .exec(self.conn)
            .await?;

        if result.rows_affected > 0 {
            return Ok(());
        }

        let exists = original_image::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .is_some();

        if exists {
            Ok(())
        } else {
            Err(ImageError::NotFound(format!("original image {id}")))
        }
    }

    /// Cleanup candidates: zero references and untouched for longer than `older_than`.
    ///
    /// Oldest first, at most `limit` rows.
    pub async fn list_orphaned(
        &self,
        older_than: Duration,
        limit: u64,
    ) -> Result<Vec<original_image::Model>, DbErr> {
        original_image::Entity::find()
            .filter(original_image::Column::ReferenceCount.eq(0))
            .filter(original_image::Column::UpdatedAt.lt(cutoff_before_now(older_than)))
            .order_by_asc(original_image::Column::UpdatedAt)
            .order_by_asc(original_image::Column::Id)
            .limit(limit)
            .all(self.conn)
            .await
    }

    /// Remove the row only while nothing references it.
    ///
    /// Returns `false` when the row is gone or was re-referenced since it was read.
    pub async fn delete_if_unreferenced(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = original_image::Entity::delete_many()
            .filter(original_image::Column::Id.eq(id))
            .filter(original_image::Column::ReferenceCount.eq(0))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Permanently remove the row.
    pub async fn delete(&self, id: Uuid) -> Result<(), ImageError> {
        let result = original_image::Entity::delete_by_id(id)
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ImageError::NotFound(format!("original image {id}")));
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<OriginalImageStats, DbErr> {
        let row: Option<(i64, i64, i64, i64, i64)> = original_image::Entity::find()
            .select_only()
            .column_as(Expr::cust("COUNT(*)"), "total_count")
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(file_size), 0) AS BIGINT)"),
                "total_size",
            )
            .column_as(
                Expr::cust(
                    "CAST(COALESCE(SUM(CASE WHEN reference_count = 0 THEN 1 ELSE 0 END), 0) AS BIGINT)",
                ),
                "orphaned_count",
            )
            .column_as(
                Expr::cust(
                    "CAST(COALESCE(SUM(CASE WHEN reference_count = 0 THEN file_size ELSE 0 END), 0) AS BIGINT)",
                ),
                "orphaned_size",
            )
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(reference_count), 0) AS BIGINT)"),
                "total_references",
            )
            .into_tuple()
            .one(self.conn)
            .await?;

        let Some((total_count, total_size, orphaned_count, orphaned_size, total_references)) = row
        else {
            return Ok(OriginalImageStats::default());
        };

        let avg_references = if total_count > 0 {
            total_references as f64 / total_count as f64
        } else {
            0.0
        };

        Ok(OriginalImageStats {
            total_count: u64::try_from(total_count).unwrap_or_default(),
            total_size: u64::try_from(total_size).unwrap_or_default(),
            orphaned_count: u64::try_from(orphaned_count).unwrap_or_default(),
            orphaned_size: u64::try_from(orphaned_size).unwrap_or_default(),
            avg_references,
        })
    }
}
