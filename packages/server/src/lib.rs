pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod originals;
pub mod reconcile;
pub mod routes;
pub mod staged;
pub mod state;
pub mod storage;
pub mod sweeper;
pub mod utils;

use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stagehand API",
        version = "1.0.0",
        description = "Upload and lifecycle API for virtual staging images"
    ),
    tags(
        (name = "Images", description = "Uploading and deleting project images"),
        (name = "Admin", description = "Storage statistics, garbage collection and reconciliation"),
    ),
    modifiers(&SecurityAddon),
)]
struct ApiDoc;

/// Registers the `admin_token` bearer scheme referenced by the admin handlers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let scheme = HttpBuilder::new()
            .scheme(HttpAuthScheme::Bearer)
            .description(Some("Static token configured as `auth.admin_token`"))
            .build();
        openapi
            .components
            .get_or_insert_default()
            .add_security_scheme("admin_token", SecurityScheme::Http(scheme));
    }
}

/// Build the application router: `/api/v1` plus Swagger UI and Scalar.
pub fn build_router(state: AppState) -> axum::Router {
    let (api_router, spec) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes(&state.config))
        .split_for_parts();

    docs_router(spec)
        .merge(api_router.with_state(state))
        .layer(TraceLayer::new_for_http())
}

fn docs_router(spec: utoipa::openapi::OpenApi) -> axum::Router {
    axum::Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", spec.clone()))
        .merge(Scalar::with_url("/scalar", spec))
}
