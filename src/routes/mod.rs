//! Router assembly.

mod common;
mod entity;
mod table;

pub use common::common_routes;
pub use entity::entity_routes;
pub use table::{list_routes, NamedRoute, RouteTable, API_PREFIX};

use crate::settings::UploadBackend;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Full application: common routes at the root, entity routes under `/api/v1`,
/// request tracing and a body cap of `MEDCMS_MAX_UPLOAD_BYTES`. Local uploads are
/// served from the public URL when it is a path on this server.
pub fn app(state: AppState) -> Router {
    let limit = state.settings.max_upload_bytes;
    let mut router = Router::new()
        .merge(common_routes(state.clone()))
        .nest(API_PREFIX, entity_routes(state.clone()));
    if let UploadBackend::Local { root } = &state.settings.upload_backend {
        let public = state.settings.public_url.as_str();
        if public.starts_with('/') && public.len() > 1 {
            router = router.nest_service(public, ServeDir::new(root));
        }
    }
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(limit)),
    )
}
