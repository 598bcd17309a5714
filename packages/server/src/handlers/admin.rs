use axum::{Json, extract::State};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::admin::AdminToken;
use crate::extractors::json::JsonOrDefault;
use crate::models::admin::{
    CleanupOrphansRequest, CleanupOrphansResponse, CleanupStuckRequest, OriginalStatsResponse,
    ReconcileRequest,
};
use crate::reconcile::{ReconcileOptions, ReconcileResult, StuckCleanupResult};
use crate::state::AppState;
use crate::utils::time::hours;

#[utoipa::path(
    get,
    path = "/originals/stats",
    tag = "Admin",
    operation_id = "getOriginalStats",
    summary = "Original storage statistics",
    description = "Counts and sizes of stored originals, including orphans awaiting the sweep.",
    responses(
        (status = 200, description = "Statistics", body = OriginalStatsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn get_original_stats(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<OriginalStatsResponse>, AppError> {
    let stats = state.originals.get_stats().await?;
    Ok(Json(stats.into()))
}

#[utoipa::path(
    post,
    path = "/originals/cleanup",
    tag = "Admin",
    operation_id = "cleanupOrphanedOriginals",
    summary = "Sweep orphaned originals",
    description = "Deletes originals with no references that have been idle longer than the grace period.",
    request_body = CleanupOrphansRequest,
    responses(
        (status = 200, description = "Sweep finished", body = CleanupOrphansResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn cleanup_orphaned_originals(
    _admin: AdminToken,
    State(state): State<AppState>,
    JsonOrDefault(req): JsonOrDefault<CleanupOrphansRequest>,
) -> Result<Json<CleanupOrphansResponse>, AppError> {
    let gc = &state.config.gc;
    let grace = req
        .grace_period_secs
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| gc.orphan_grace_period());
    let limit = req.limit.unwrap_or(gc.orphan_batch_limit).clamp(1, 10_000);

    let deleted = state.originals.cleanup_orphaned(grace, limit).await?;
    Ok(Json(CleanupOrphansResponse { deleted }))
}

#[utoipa::path(
    post,
    path = "/reconcile",
    tag = "Admin",
    operation_id = "reconcileImages",
    summary = "Reconcile staged images with storage",
    description = "Checks every live staged image against the object store. Ready images whose \
        staged file is missing are moved to `error` unless `dry_run` is set.",
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Reconciliation report", body = ReconcileResult),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn reconcile_images(
    _admin: AdminToken,
    State(state): State<AppState>,
    JsonOrDefault(req): JsonOrDefault<ReconcileRequest>,
) -> Result<Json<ReconcileResult>, AppError> {
    let defaults = &state.config.reconcile;
    let options = ReconcileOptions {
        limit: req.batch_size.unwrap_or(defaults.batch_size).clamp(1, 1_000),
        concurrency: req.concurrency.unwrap_or(defaults.concurrency).clamp(1, 100),
        dry_run: req.dry_run,
        project_filter: req.project_id,
        status_filter: req.status,
    };

    let result = state
        .reconcile
        .reconcile_images(&options, &CancellationToken::new())
        .await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/staged-images/cleanup-stuck",
    tag = "Admin",
    operation_id = "cleanupStuckStagedImages",
    summary = "Delete stuck queued images",
    description = "Hard-deletes staged images that have stayed `queued` for longer than the threshold \
        and releases their original references.",
    request_body = CleanupStuckRequest,
    responses(
        (status = 200, description = "Deleted image IDs", body = StuckCleanupResult),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn cleanup_stuck_images(
    _admin: AdminToken,
    State(state): State<AppState>,
    JsonOrDefault(req): JsonOrDefault<CleanupStuckRequest>,
) -> Result<Json<StuckCleanupResult>, AppError> {
    let older_than = hours(
        req.older_than_hours
            .unwrap_or(state.config.gc.stuck_queued_hours),
    );

    let result = state
        .reconcile
        .cleanup_stuck_queued_images(older_than)
        .await?;
    Ok(Json(result))
}
