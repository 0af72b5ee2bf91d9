//! HTTP API handlers: router queries and raw availability state.

pub mod query;
pub mod routers;

use std::sync::Arc;

use axum::http::header::{LAST_MODIFIED, RETRY_AFTER};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use fch_core::AvailabilitySnapshot;
use fch_services::{AvailabilityStore, RouterList};

/// Seconds a client should wait before retrying while nothing is published.
pub const RETRY_AFTER_SECS: u32 = 60;

#[derive(Clone)]
pub struct ApiState {
    /// Published availability snapshots.
    pub store: AvailabilityStore,
    /// Current router population, before probing.
    pub directory: Arc<dyn RouterList>,
}

/// 503 with `Retry-After`, served until the first usable snapshot exists.
pub(crate) fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS))],
    )
        .into_response()
}

pub(crate) fn last_modified(snapshot: &AvailabilitySnapshot) -> (HeaderName, HeaderValue) {
    let value = HeaderValue::from_str(&snapshot.http_date())
        .unwrap_or_else(|_| HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"));
    (LAST_MODIFIED, value)
}
