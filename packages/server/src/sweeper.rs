use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::GcConfig;
use crate::originals::OriginalImageService;
use crate::reconcile::ReconcileService;
use crate::utils::time::hours;

/// Run the garbage-collection sweep as a background task until `shutdown` fires.
///
/// Each tick removes orphaned originals past the grace period, then deletes
/// staged images stuck in `queued`. Failures are logged and retried on the
/// next tick.
pub async fn run_sweeper(
    originals: OriginalImageService,
    reconcile: ReconcileService,
    config: GcConfig,
    shutdown: CancellationToken,
) {
    info!(
        interval_secs = config.sweep_interval_secs,
        grace_period_secs = config.orphan_grace_period_secs,
        stuck_queued_hours = config.stuck_queued_hours,
        "Starting storage sweeper"
    );

    let mut interval = tokio::time::interval(config.sweep_interval());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Storage sweeper stopped");
                return;
            }
            _ = interval.tick() => {}
        }

        sweep_once(&originals, &reconcile, &config).await;
    }
}

/// One sweep pass. Both halves run even if the first one fails.
pub async fn sweep_once(
    originals: &OriginalImageService,
    reconcile: &ReconcileService,
    config: &GcConfig,
) {
    if let Err(e) = originals
        .cleanup_orphaned(config.orphan_grace_period(), config.orphan_batch_limit)
        .await
    {
        error!(error = %e, "Orphaned original sweep failed");
    }

    if let Err(e) = reconcile
        .cleanup_stuck_queued_images(hours(config.stuck_queued_hours))
        .await
    {
        error!(error = %e, "Stuck queued image cleanup failed");
    }
}
