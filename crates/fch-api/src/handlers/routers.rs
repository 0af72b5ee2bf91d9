//! /routers.json, /routerlist.json, /robots.txt handlers.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use fch_core::Router;

use super::{last_modified, unavailable, ApiState};

/// The published snapshot as-is, for monitoring.
pub async fn handle_routers(State(state): State<ApiState>) -> Response {
    match state.store.current() {
        Some(snapshot) => (
            [last_modified(&snapshot)],
            Json(snapshot.routers.clone()),
        )
            .into_response(),
        None => unavailable(),
    }
}

/// The directory's current routers, probed or not.
pub async fn handle_router_list(State(state): State<ApiState>) -> Json<Vec<Router>> {
    Json(state.directory.list())
}

pub async fn handle_robots() -> &'static str {
    "User-Agent: *\nDisallow: /\n"
}
