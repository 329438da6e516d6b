//! Console view of the current playback state.
//!
//! Redraws the whole screen on a fixed interval. Tracing output goes to
//! stderr, so redirecting one of the two streams keeps the view readable.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::watcher::{PlaybackTracker, SnapshotRecord};

const CLEAR_AND_HOME: &str = "\x1b[2J\x1b[H";

/// Redraw every `refresh` until `cancel` fires.
pub async fn run(
    tracker: Arc<PlaybackTracker>,
    viewer_url: String,
    fudge: f64,
    refresh: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let frame = render_frame(&tracker.snapshot(fudge), &viewer_url);
                let mut stdout = io::stdout().lock();
                // A closed stdout is not worth stopping for.
                let _ = write!(stdout, "{CLEAR_AND_HOME}{frame}");
                let _ = stdout.flush();
            }
        }
    }
}

/// One screenful describing `snapshot`.
pub fn render_frame(snapshot: &SnapshotRecord, viewer_url: &str) -> String {
    let watch_url = if snapshot.watch_url.is_empty() {
        "-"
    } else {
        snapshot.watch_url.as_str()
    };

    let mut out = String::new();
    out.push_str("VRChat Video Sync\n");
    out.push_str(&"-".repeat(60));
    out.push('\n');
    out.push_str(&format!(" Source   : {}\n", snapshot.source.as_str()));
    out.push_str(&format!(
        " Video ID : {}\n",
        snapshot.video_id.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!(
        " Position : {}\n",
        fmt_sec(Some(snapshot.estimated_position_sec))
    ));
    out.push_str(&format!(" Duration : {}\n", fmt_sec(snapshot.duration_sec)));
    out.push_str(&format!(" Status   : {}\n", snapshot.status.as_str()));
    out.push_str(&format!(" URL      : {watch_url}\n"));
    out.push('\n');
    out.push_str(" [Ctrl+C] Exit\n");
    out.push_str(&format!(" Open: {viewer_url}\n"));
    out
}

fn fmt_sec(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() => format!("{s:.2}s"),
        _ => "-".to_string(),
    }
}
