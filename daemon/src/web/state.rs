//! `GET /state`: the current playback snapshot as JSON.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    /// Kept as text so a malformed value falls back to the default instead
    /// of rejecting the request.
    fudge: Option<String>,
}

pub async fn get_state(State(app): State<AppState>, Query(query): Query<StateQuery>) -> Response {
    let fudge = parse_fudge(query.fudge.as_deref(), app.default_fudge);
    let snapshot = app.tracker.snapshot(fudge);
    ([(header::CACHE_CONTROL, "no-store")], Json(snapshot)).into_response()
}

fn parse_fudge(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .unwrap_or(default)
}
