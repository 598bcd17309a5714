use common::StagedImageStatus;
use serde::{Deserialize, Serialize};

use crate::originals::OriginalImageStats;

#[derive(Serialize, utoipa::ToSchema)]
pub struct OriginalStatsResponse {
    #[schema(example = 1200)]
    pub total_count: u64,
    /// Bytes across all originals.
    #[schema(example = 5_368_709_120_u64)]
    pub total_size: u64,
    /// Originals without references still waiting for the sweep.
    #[schema(example = 3)]
    pub orphaned_count: u64,
    #[schema(example = 12_582_912)]
    pub orphaned_size: u64,
    #[schema(example = 1.4)]
    pub avg_references: f64,
}

impl From<OriginalImageStats> for OriginalStatsResponse {
    fn from(s: OriginalImageStats) -> Self {
        Self {
            total_count: s.total_count,
            total_size: s.total_size,
            orphaned_count: s.orphaned_count,
            orphaned_size: s.orphaned_size,
            avg_references: s.avg_references,
        }
    }
}

/// Body of an orphan sweep request. Missing fields fall back to the `gc` config.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct CleanupOrphansRequest {
    /// Minimum time since the last reference went away.
    #[schema(example = 86400)]
    pub grace_period_secs: Option<u64>,
    #[schema(example = 100)]
    pub limit: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CleanupOrphansResponse {
    #[schema(example = 3)]
    pub deleted: u64,
}

/// Body of a reconciliation request. Missing fields fall back to the `reconcile` config.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct ReconcileRequest {
    #[schema(example = 100)]
    pub batch_size: Option<u64>,
    #[schema(example = 10)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub dry_run: bool,
    pub project_id: Option<i32>,
    pub status: Option<StagedImageStatus>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct CleanupStuckRequest {
    /// Age in hours after which a queued image counts as stuck.
    #[schema(example = 1)]
    pub older_than_hours: Option<u64>,
}
