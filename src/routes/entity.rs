//! Entity routes. Parameterized paths: handlers resolve the entity by segment and check
//! that it exposes the operation.

use crate::handlers::{check, destroy, export, form_props, index, show, status, store, update, upload};
use crate::routes::table::list_routes;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/routes", get(list_routes))
        .route("/uploads/:segment/:field", post(upload))
        .route("/:segment", get(index).post(store))
        .route("/:segment/export", get(export))
        .route("/:segment/check", get(check))
        .route("/:segment/form-props", get(form_props))
        .route("/:segment/:id", get(show).patch(update).put(update).delete(destroy))
        .route("/:segment/:id/status", patch(status))
        .with_state(state)
}
