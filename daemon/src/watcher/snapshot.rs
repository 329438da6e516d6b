//! Point-in-time view of the playback belief, as served to viewers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::playback_tracker::{PlaybackBelief, PlaybackStatus, Source};

/// JSON body of `GET /state`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRecord {
    pub playing: bool,
    pub source: Source,
    pub video_id: Option<String>,
    pub watch_url: String,
    pub status: PlaybackStatus,
    pub estimated_position_sec: f64,
    pub duration_sec: Option<f64>,
    pub last_event: String,
}

/// Render `belief` as seen at `now`, with `fudge_seconds` of viewer latency
/// subtracted from the extrapolated position.
pub fn render(belief: &PlaybackBelief, fudge_seconds: f64, now: DateTime<Utc>) -> SnapshotRecord {
    SnapshotRecord {
        // An error status still counts as playing; only idle stops the viewer.
        playing: belief.current_video_id.is_some() && belief.status != PlaybackStatus::Idle,
        source: belief.source,
        video_id: belief.current_video_id.clone(),
        watch_url: belief.watch_url.clone(),
        status: belief.status,
        estimated_position_sec: estimated_position(belief.started_at, fudge_seconds, now),
        duration_sec: belief.duration_seconds,
        last_event: belief.last_event_label.clone(),
    }
}

/// `max(0, now - started - max(fudge, 0))`, or 0 without an anchor.
pub fn estimated_position(
    started_at: Option<DateTime<Utc>>,
    fudge_seconds: f64,
    now: DateTime<Utc>,
) -> f64 {
    let Some(started) = started_at else {
        return 0.0;
    };
    let elapsed = now.signed_duration_since(started).num_milliseconds() as f64 / 1000.0;
    (elapsed - fudge_seconds.max(0.0)).max(0.0)
}
