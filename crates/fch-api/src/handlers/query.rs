//! GET /: the router query endpoint.
//!
//! Plain text (the default) is a single comma-separated line of connect
//! strings in legacy syntax, for clients that predate the JSON format.

use axum::extract::{RawQuery, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;

use fch_core::{execute_queries, parse_queries, QueryError};

use super::{last_modified, unavailable, ApiState};

const MIME_TEXT: &str = "text/plain";
const MIME_JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    fn mime(self) -> &'static str {
        match self {
            Format::Text => MIME_TEXT,
            Format::Json => MIME_JSON,
        }
    }
}

/// Pick a response format from an `Accept` header. Text wins ties and is
/// the fallback when nothing offered is acceptable.
pub fn negotiate(accept: Option<&str>) -> Format {
    let Some(accept) = accept else {
        return Format::Text;
    };
    let ranges: Vec<(&str, f32)> = accept.split(',').filter_map(parse_media_range).collect();

    let mut best = (Format::Text, 0.0_f32);
    for format in [Format::Text, Format::Json] {
        let q = quality(format.mime(), &ranges);
        if q > best.1 {
            best = (format, q);
        }
    }
    best.0
}

/// `type/subtype;q=0.5` → (`type/subtype`, 0.5).
fn parse_media_range(range: &str) -> Option<(&str, f32)> {
    let mut parts = range.split(';').map(str::trim);
    let media = parts.next().filter(|m| m.contains('/'))?;
    let mut q = 1.0;
    for param in parts {
        if let Some(v) = param.strip_prefix("q=").or_else(|| param.strip_prefix("Q=")) {
            q = v.trim().parse().unwrap_or(0.0);
        }
    }
    Some((media, q))
}

/// Quality of `mime` under the most specific matching range.
fn quality(mime: &str, ranges: &[(&str, f32)]) -> f32 {
    let (kind, _) = mime.split_once('/').unwrap_or((mime, ""));
    let mut best: Option<(u8, f32)> = None;
    for (range, q) in ranges {
        let specificity = if range.eq_ignore_ascii_case(mime) {
            2
        } else if range
            .strip_suffix("/*")
            .is_some_and(|k| k.eq_ignore_ascii_case(kind))
        {
            1
        } else if *range == "*/*" {
            0
        } else {
            continue;
        };
        if best.map_or(true, |(s, _)| specificity > s) {
            best = Some((specificity, *q));
        }
    }
    best.map_or(0.0, |(_, q)| q)
}

pub async fn handle_query(
    State(state): State<ApiState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let format = negotiate(headers.get(ACCEPT).and_then(|v| v.to_str().ok()));
    let queries = parse_queries(query.as_deref().unwrap_or(""));
    let Some(snapshot) = state.store.current() else {
        return unavailable();
    };

    let legacy = format == Format::Text;
    let response = match execute_queries(&queries, Some(snapshot.as_ref()), legacy) {
        Ok(response) => response,
        Err(QueryError::Unavailable) => return unavailable(),
    };

    tracing::debug!(
        clauses = queries.len(),
        routers = response.routers.len(),
        format = format.mime(),
        "query served"
    );

    match format {
        Format::Json => ([last_modified(&snapshot)], Json(response)).into_response(),
        Format::Text => (
            [
                last_modified(&snapshot),
                (CONTENT_TYPE, HeaderValue::from_static(MIME_TEXT)),
            ],
            response.to_text(),
        )
            .into_response(),
    }
}
