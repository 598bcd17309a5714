use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/projects", project_routes(config))
        .nest("/images", image_routes())
        .nest("/admin", admin_routes())
}

fn project_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::image::upload_image))
        .layer(handlers::image::upload_body_limit(
            config.storage.max_object_size,
        ))
}

fn image_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::image::delete_image))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::admin::get_original_stats))
        .routes(routes!(handlers::admin::cleanup_orphaned_originals))
        .routes(routes!(handlers::admin::reconcile_images))
        .routes(routes!(handlers::admin::cleanup_stuck_images))
}
