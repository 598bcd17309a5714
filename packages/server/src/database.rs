use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

use crate::config::DatabaseConfig;

/// Open the pool and create any missing tables and indexes for the registered entities.
pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());

    let timeout = Duration::from_secs(config.acquire_timeout_secs);
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .connect_timeout(timeout)
        .acquire_timeout(timeout)
        .sqlx_logging(config.sqlx_logging);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("stagehand_server::entity::*")
        .sync(&db)
        .await?;

    info!(
        backend = ?db.get_database_backend(),
        max_connections = config.max_connections,
        "Database ready"
    );
    Ok(db)
}
