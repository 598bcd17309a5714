use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::StagedImageStatus;
use common::storage::ObjectStore;
use futures::StreamExt;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::entity::staged_image;
use crate::originals::OriginalImageService;
use crate::utils::time::cutoff_before_now;

use super::types::{ReconcileError, ReconcileOptions, ReconcileResult, StuckCleanupResult};

/// Rows loaded per round trip by the stuck-queued scan.
pub const STUCK_SCAN_PAGE_SIZE: u64 = 100;

/// Result of probing one row's objects.
enum CheckOutcome {
    Checked {
        original_missing: bool,
        staged_missing: bool,
    },
    Failed(String),
}

/// Compares staged-image metadata against the object store and repairs drift.
#[derive(Clone)]
pub struct ReconcileService {
    db: DatabaseConnection,
    store: Arc<dyn ObjectStore>,
    originals: OriginalImageService,
    check_timeout: Duration,
}

impl ReconcileService {
    pub fn new(
        db: DatabaseConnection,
        store: Arc<dyn ObjectStore>,
        originals: OriginalImageService,
        check_timeout: Duration,
    ) -> Self {
        Self {
            db,
            store,
            originals,
            check_timeout,
        }
    }

    /// Walk every live staged image in id order and check its objects.
    ///
    /// Rows marked `ready` whose staged file is gone are moved to `error`
    /// unless `dry_run` is set. Missing originals are only reported. When
    /// `cancel` fires, checks already started for the current page complete
    /// and the partial result is returned.
    #[instrument(skip(self, cancel), fields(dry_run = options.dry_run))]
    pub async fn reconcile_images(
        &self,
        options: &ReconcileOptions,
        cancel: &CancellationToken,
    ) -> Result<ReconcileResult, ReconcileError> {
        let limit = options.limit.max(1);
        let concurrency = options.concurrency.max(1);
        let mut result = ReconcileResult {
            dry_run: options.dry_run,
            ..Default::default()
        };
        let mut cursor: Option<i32> = None;

        info!(
            limit,
            concurrency,
            project = ?options.project_filter,
            status = ?options.status_filter,
            "Starting reconciliation"
        );

        loop {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }

            let page = self.fetch_page(options, cursor, limit).await?;
            let page_len = page.len() as u64;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(last.id);

            let mut outcomes: Vec<(staged_image::Model, CheckOutcome)> =
                futures::stream::iter(page)
                    .take_until(cancel.cancelled())
                    .map(|row| async move {
                        let outcome = self.check_row(&row).await;
                        (row, outcome)
                    })
                    .buffer_unordered(concurrency)
                    .collect()
                    .await;
            outcomes.sort_by_key(|(row, _)| row.id);

            for (row, outcome) in outcomes {
                self.apply_outcome(&row, outcome, options.dry_run, &mut result)
                    .await?;
            }

            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            if page_len < limit {
                break;
            }
        }

        info!(
            checked = result.checked,
            missing_original = result.missing_original,
            missing_staged = result.missing_staged,
            updated = result.updated,
            check_failures = result.check_failures,
            cancelled = result.cancelled,
            "Reconciliation finished"
        );

        Ok(result)
    }

    async fn fetch_page(
        &self,
        options: &ReconcileOptions,
        cursor: Option<i32>,
        limit: u64,
    ) -> Result<Vec<staged_image::Model>, DbErr> {
        let mut query = staged_image::Entity::find()
            .filter(staged_image::Column::DeletedAt.is_null());

        if let Some(last_id) = cursor {
            query = query.filter(staged_image::Column::Id.gt(last_id));
        }
        if let Some(project_id) = options.project_filter {
            query = query.filter(staged_image::Column::ProjectId.eq(project_id));
        }
        if let Some(status) = options.status_filter {
            query = query.filter(staged_image::Column::Status.eq(status));
        }

        query
            .order_by_asc(staged_image::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
    }

    async fn check_row(&self, row: &staged_image::Model) -> CheckOutcome {
        let original_exists = match self.exists_within_timeout(&row.original_key).await {
            Ok(exists) => exists,
            Err(reason) => return CheckOutcome::Failed(reason),
        };

        let staged_key = match (&row.stored_key, row.status) {
            (Some(key), StagedImageStatus::Ready) => Some(key),
            _ => None,
        };

        let staged_missing = match staged_key {
            Some(key) => match self.exists_within_timeout(key).await {
                Ok(exists) => !exists,
                Err(reason) => return CheckOutcome::Failed(reason),
            },
            None => false,
        };

        CheckOutcome::Checked {
            original_missing: !original_exists,
            staged_missing,
        }
    }

    async fn exists_within_timeout(&self, key: &str) -> Result<bool, String> {
        match tokio::time::timeout(self.check_timeout, self.store.exists(key)).await {
            Ok(Ok(exists)) => Ok(exists),
            Ok(Err(e)) => Err(format!("storage check for {key} failed: {e}")),
            Err(_) => Err(format!(
                "storage check for {key} timed out after {}s",
                self.check_timeout.as_secs_f64()
            )),
        }
    }

    async fn apply_outcome(
        &self,
        row: &staged_image::Model,
        outcome: CheckOutcome,
        dry_run: bool,
        result: &mut ReconcileResult,
    ) -> Result<(), ReconcileError> {
        let (original_missing, staged_missing) = match outcome {
            CheckOutcome::Failed(reason) => {
                warn!(id = row.id, reason = %reason, "Reconciliation check failed");
                result.check_failures += 1;
                result.push_example(row.id, row.status, reason);
                return Ok(());
            }
            CheckOutcome::Checked {
                original_missing,
                staged_missing,
            } => (original_missing, staged_missing),
        };

        result.checked += 1;

        if original_missing {
            result.missing_original += 1;
            result.push_example(
                row.id,
                row.status,
                format!("original object {} is missing", row.original_key),
            );
        }

        if staged_missing {
            result.missing_staged += 1;
            let key = row.stored_key.as_deref().unwrap_or_default();
            result.push_example(
                row.id,
                row.status,
                format!("staged object {key} is missing"),
            );

            if !dry_run && self.mark_missing_staged(row.id, key).await? {
                result.updated += 1;
            }
        }

        Ok(())
    }

    /// Move a `ready` row to `error`. A row that already left `ready` is left alone.
    async fn mark_missing_staged(&self, id: i32, key: &str) -> Result<bool, DbErr> {
        let update = staged_image::Entity::update_many()
            .col_expr(
                staged_image::Column::Status,
                Expr::value(StagedImageStatus::Error),
            )
            .col_expr(
                staged_image::Column::ErrorMessage,
                Expr::value(format!("Staged file {key} is missing from storage")),
            )
            .col_expr(staged_image::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(staged_image::Column::Id.eq(id))
            .filter(staged_image::Column::Status.eq(StagedImageStatus::Ready))
            .exec(&self.db)
            .await?;

        let updated = update.rows_affected > 0;
        if updated {
            info!(id, key, "Marked staged image with missing file as error");
        }
        Ok(updated)
    }

    /// Hard-delete `queued` rows created more than `older_than` ago.
    ///
    /// Each deleted row hands its original reference back so the original's
    /// count keeps matching its live staged images.
    #[instrument(skip(self))]
    pub async fn cleanup_stuck_queued_images(
        &self,
        older_than: Duration,
    ) -> Result<StuckCleanupResult, ReconcileError> {
        let cutoff = cutoff_before_now(older_than);
        let mut deleted_ids = Vec::new();
        let mut last_seen: Option<i32> = None;

        loop {
            let mut query = staged_image::Entity::find()
                .filter(staged_image::Column::Status.eq(StagedImageStatus::Queued))
                .filter(staged_image::Column::CreatedAt.lt(cutoff))
                .filter(staged_image::Column::DeletedAt.is_null());
            if let Some(last) = last_seen {
                query = query.filter(staged_image::Column::Id.gt(last));
            }
            let page = query
                .order_by_asc(staged_image::Column::Id)
                .limit(STUCK_SCAN_PAGE_SIZE)
                .all(&self.db)
                .await?;

            let page_len = page.len() as u64;
            last_seen = page.last().map(|row| row.id).or(last_seen);

            for row in page {
                if self.delete_stuck_row(&row).await? {
                    deleted_ids.push(row.id);
                }
            }

            if page_len < STUCK_SCAN_PAGE_SIZE {
                break;
            }
        }

        if !deleted_ids.is_empty() {
            info!(count = deleted_ids.len(), ids = ?deleted_ids, "Deleted stuck queued staged images");
        }

        Ok(StuckCleanupResult { deleted_ids })
    }

    /// Delete one stuck row and release its original. Returns `false` if the
    /// row left `queued` before the delete ran.
    async fn delete_stuck_row(&self, row: &staged_image::Model) -> Result<bool, ReconcileError> {
        // Conditional on status so a row picked up meanwhile survives.
        let deleted = staged_image::Entity::delete_many()
            .filter(staged_image::Column::Id.eq(row.id))
            .filter(staged_image::Column::Status.eq(StagedImageStatus::Queued))
            .exec(&self.db)
            .await?;

        if deleted.rows_affected == 0 {
            debug!(id = row.id, "Stuck row changed before delete, skipping");
            return Ok(false);
        }

        let Some(original_id) = row.original_image_id else {
            return Ok(true);
        };
        if let Err(e) = self
            .originals
            .decrement_reference_and_cleanup(original_id)
            .await
        {
            warn!(
                id = row.id,
                original_id = %original_id,
                error = %e,
                "Failed to release original of stuck staged image"
            );
        }
        Ok(true)
    }
}
