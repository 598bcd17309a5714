use common::StagedImageStatus;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Upper bound on examples carried in a [`ReconcileResult`].
pub const MAX_EXAMPLES: usize = 10;

/// Parameters of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Rows per keyset page.
    pub limit: u64,
    /// In-flight storage checks per page.
    pub concurrency: usize,
    /// Report drift without writing any repair.
    pub dry_run: bool,
    pub project_filter: Option<i32>,
    pub status_filter: Option<StagedImageStatus>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            concurrency: 10,
            dry_run: false,
            project_filter: None,
            status_filter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileExample {
    pub id: i32,
    pub status: StagedImageStatus,
    pub description: String,
}

/// Counters and sample findings of a reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ReconcileResult {
    /// Rows whose storage checks completed.
    pub checked: u64,
    pub missing_original: u64,
    pub missing_staged: u64,
    /// Rows moved from `ready` to `error`.
    pub updated: u64,
    /// Rows skipped because a storage check failed or timed out.
    pub check_failures: u64,
    pub dry_run: bool,
    /// The pass stopped early on cancellation.
    pub cancelled: bool,
    pub examples: Vec<ReconcileExample>,
}

impl ReconcileResult {
    pub(crate) fn push_example(&mut self, id: i32, status: StagedImageStatus, description: String) {
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(ReconcileExample {
                id,
                status,
                description,
            });
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct StuckCleanupResult {
    pub deleted_ids: Vec<i32>,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Page reads or repair writes failed; the pass cannot continue.
    #[error("database error during reconciliation: {0}")]
    Database(#[from] DbErr),
}
