//! Replay of a saved log from its first line, at a fixed pace.
//!
//! Used for demos and deterministic testing: the file is read once, every
//! line goes through the same classifier and tracker as live input, and the
//! worker then goes quiet.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::file_watcher::LogCursor;
use super::log_parser::classify;
use super::playback_tracker::PlaybackTracker;
use crate::error::Error;

/// Counters from one replay or follow run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub lines_read: u64,
    pub events_applied: u64,
}

impl ProcessingStats {
    /// Classify one line and apply its event, if any.
    pub fn process_line(&mut self, tracker: &PlaybackTracker, line: &str) {
        self.lines_read += 1;
        if let Some(event) = classify(line) {
            tracker.apply(&event);
            self.events_applied += 1;
        }
    }
}

/// Replay `path` into `tracker`, sleeping `pace` after each line. Stops
/// early when `cancel` fires. Failing to open the file is fatal; read
/// errors mid-way end the replay with what was read so far.
pub fn process_history(
    path: &Path,
    tracker: &PlaybackTracker,
    pace: Duration,
    cancel: &CancellationToken,
) -> Result<ProcessingStats, Error> {
    let mut cursor = LogCursor::open_at_start(path)?;
    let mut stats = ProcessingStats::default();
    info!(path = %path.display(), "Replaying log");

    while !cancel.is_cancelled() {
        let line = match cursor.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                if let Some(last) = cursor.take_partial() {
                    stats.process_line(tracker, &last);
                }
                break;
            }
            Err(e) => {
                warn!(error = %e, offset = cursor.offset(), "Replay read failed");
                break;
            }
        };
        stats.process_line(tracker, &line);
        if !pace.is_zero() {
            thread::sleep(pace);
        }
    }

    info!(
        lines = stats.lines_read,
        events = stats.events_applied,
        "Replay finished"
    );
    Ok(stats)
}
