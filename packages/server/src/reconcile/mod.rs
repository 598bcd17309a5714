mod service;
mod types;

pub use service::{ReconcileService, STUCK_SCAN_PAGE_SIZE};
pub use types::{
    MAX_EXAMPLES, ReconcileError, ReconcileExample, ReconcileOptions, ReconcileResult,
    StuckCleanupResult,
};
