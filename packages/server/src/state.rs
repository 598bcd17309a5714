use std::sync::Arc;

use common::storage::ObjectStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::originals::OriginalImageService;
use crate::reconcile::ReconcileService;
use crate::staged::StagedImageService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub store: Arc<dyn ObjectStore>,
    pub originals: OriginalImageService,
    pub staged: StagedImageService,
    pub reconcile: ReconcileService,
}

impl AppState {
    /// Wire the services around one pool and one object store.
    pub fn new(config: AppConfig, db: DatabaseConnection, store: Arc<dyn ObjectStore>) -> Self {
        let originals = OriginalImageService::new(db.clone(), store.clone());
        let staged = StagedImageService::new(db.clone(), originals.clone());
        let reconcile = ReconcileService::new(
            db.clone(),
            store.clone(),
            originals.clone(),
            config.storage.check_timeout(),
        );

        Self {
            config: Arc::new(config),
            db,
            store,
            originals,
            staged,
            reconcile,
        }
    }
}
