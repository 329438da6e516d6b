//! Background worker feeding log lines into the tracker.
//!
//! Runs on its own OS thread: file reads are blocking and the follower waits
//! in short bounded sleeps, checking the cancellation token in between.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use super::file_watcher::{FollowTarget, LogFollower};
use super::history::{process_history, ProcessingStats};
use super::playback_tracker::PlaybackTracker;
use crate::config::LogConfig;
use crate::error::Error;

/// Where the worker reads lines from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// Tail a live log from its current end.
    Follow(FollowTarget),
    /// Read a saved log from the start at the configured pace.
    Replay(PathBuf),
}

impl LogSource {
    pub fn replay(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::ReplayNotFound(path.to_path_buf()));
        }
        Ok(Self::Replay(path.to_path_buf()))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Follow(FollowTarget::Directory { dir, .. }) => {
                format!("newest log in {}", dir.display())
            }
            Self::Follow(FollowTarget::File(path)) => path.display().to_string(),
            Self::Replay(path) => format!("replay of {}", path.display()),
        }
    }
}

/// Start the worker. It returns its counters once `cancel` fires, or, for
/// a replay, once the file is exhausted.
pub fn spawn(
    source: LogSource,
    config: LogConfig,
    tracker: Arc<PlaybackTracker>,
    cancel: CancellationToken,
) -> io::Result<JoinHandle<ProcessingStats>> {
    thread::Builder::new()
        .name("log-worker".to_string())
        .spawn(move || run(source, &config, &tracker, &cancel))
}

fn run(
    source: LogSource,
    config: &LogConfig,
    tracker: &PlaybackTracker,
    cancel: &CancellationToken,
) -> ProcessingStats {
    match source {
        LogSource::Follow(target) => {
            let follower = LogFollower::new(target, config).with_fs_notifications();
            let mut stats = ProcessingStats::default();
            for followed in follower.lines(cancel.clone()) {
                trace!(path = %followed.path.display(), line = %followed.line, "Log line");
                stats.process_line(tracker, &followed.line);
            }
            info!(
                lines = stats.lines_read,
                events = stats.events_applied,
                "Log worker stopped"
            );
            stats
        }
        LogSource::Replay(path) => {
            match process_history(&path, tracker, config.replay_pace(), cancel) {
                Ok(stats) => stats,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Replay failed");
                    ProcessingStats::default()
                }
            }
        }
    }
}
