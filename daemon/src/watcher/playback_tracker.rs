//! Playback state reconstructed from the log event stream.
//!
//! [`PlaybackBelief`] holds the transition rules; [`PlaybackTracker`] shares
//! one belief between the log worker (writer) and any number of HTTP or
//! console readers behind a single coarse lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;

use super::log_parser::{
    duration_param, extract_video_id, watch_url, LogEvent, TimedEvent, ZERO_OFFSET_EPSILON,
};
use super::snapshot::{render, SnapshotRecord};

/// Where the committed video is hosted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Youtube,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Error,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Other => "other",
        }
    }
}

impl PlaybackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Error => "error",
        }
    }
}

/// Best current guess of what is playing and since when.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackBelief {
    /// Committed video; the viewer switches media when this changes.
    pub current_video_id: Option<String>,
    /// Seen while resolving, not yet committed.
    pub pending_video_id: Option<String>,
    pub pending_url: String,
    pub source: Source,
    pub original_url: String,
    pub resolved_url: String,
    pub watch_url: String,
    pub status: PlaybackStatus,
    /// `now - started_at` approximates elapsed playback. `None` while idle.
    pub started_at: Option<DateTime<Utc>>,
    /// Set once a zero-offset opening anchored the current item.
    pub accepted_zero_start: bool,
    pub duration_seconds: Option<f64>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_event_label: String,
}

impl PlaybackBelief {
    pub fn apply(&mut self, timed: &TimedEvent) {
        let at = timed.at;
        match &timed.event {
            LogEvent::AttemptResolve { url } => self.on_attempt(at, url),
            LogEvent::Resolved {
                requested_url,
                resolved_url,
            } => self.on_resolved(at, requested_url, resolved_url),
            LogEvent::Opening {
                url,
                offset_seconds,
            } => self.on_opening(at, url, *offset_seconds),
            LogEvent::Stop => self.on_stop(at),
            LogEvent::Error { message } => self.on_error(at, message),
            LogEvent::DurationHint { seconds } => self.remember_duration(*seconds),
        }
    }

    fn on_attempt(&mut self, at: DateTime<Utc>, url: &str) {
        let vid = extract_video_id(url);
        self.source = if vid.is_some() {
            Source::Youtube
        } else {
            Source::Other
        };
        if vid.is_some() && vid != self.current_video_id {
            // New item: its duration is unknown until resolved.
            self.accepted_zero_start = false;
            self.duration_seconds = None;
        }
        self.pending_video_id = vid;
        self.pending_url = url.to_string();
        self.original_url = url.to_string();
        self.status = PlaybackStatus::Loading;
        self.touch(at, "Attempting");
    }

    fn on_resolved(&mut self, at: DateTime<Utc>, requested: &str, resolved: &str) {
        if let Some(pid) = extract_video_id(requested) {
            self.source = Source::Youtube;
            self.pending_video_id = Some(pid);
        }
        self.pending_url = requested.to_string();
        self.resolved_url = resolved.to_string();

        if let Some(duration) = duration_param(resolved) {
            self.duration_seconds = Some(duration);
        }
        // Some players never log the attempt line, so resolving commits too.
        if self.has_uncommitted_pending() {
            self.commit_pending();
        }
        self.status = PlaybackStatus::Loading;
        self.touch(at, "Resolved");
    }

    fn on_opening(&mut self, at: DateTime<Utc>, url: &str, offset_seconds: f64) {
        if self.has_uncommitted_pending() {
            self.commit_pending();
        }

        if offset_seconds <= ZERO_OFFSET_EPSILON {
            // Backends repeat "offset 0" on buffering; only the first anchors.
            if !self.accepted_zero_start {
                self.started_at = Some(at);
                self.accepted_zero_start = true;
                self.status = PlaybackStatus::Playing;
            }
        } else if let Some(started) = anchor(at, offset_seconds) {
            self.started_at = Some(started);
            self.status = PlaybackStatus::Playing;
        }

        if self.duration_seconds.is_none() {
            self.duration_seconds = duration_param(url);
        }
        let label = format!("Opening offset={}", offset_seconds.trunc() as i64);
        self.touch(at, &label);
    }

    fn on_stop(&mut self, at: DateTime<Utc>) {
        self.status = PlaybackStatus::Idle;
        self.started_at = None;
        self.touch(at, "Stop");
    }

    /// Errors are transient: position keeps extrapolating through them.
    fn on_error(&mut self, at: DateTime<Utc>, message: &str) {
        self.status = PlaybackStatus::Error;
        self.touch(at, message);
    }

    fn remember_duration(&mut self, seconds: f64) {
        if self.duration_seconds.is_none() {
            self.duration_seconds = Some(seconds);
        }
    }

    fn has_uncommitted_pending(&self) -> bool {
        self.pending_video_id.is_some() && self.pending_video_id != self.current_video_id
    }

    fn commit_pending(&mut self) {
        let Some(id) = self.pending_video_id.clone() else {
            return;
        };
        let from = if self.pending_url.is_empty() {
            &self.original_url
        } else {
            &self.pending_url
        };
        self.watch_url = watch_url(from);
        self.current_video_id = Some(id);
        self.accepted_zero_start = false;
    }

    fn touch(&mut self, at: DateTime<Utc>, label: &str) {
        self.last_event_at = Some(at);
        self.last_event_label = label.to_string();
    }
}

/// `at - offset`, or `None` if the offset is absurd.
fn anchor(at: DateTime<Utc>, offset_seconds: f64) -> Option<DateTime<Utc>> {
    let millis = (offset_seconds * 1000.0).round();
    if !millis.is_finite() || millis > i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64).and_then(|delta| at.checked_sub_signed(delta))
}

/// Process-wide playback belief shared between the log worker and readers.
#[derive(Debug, Default)]
pub struct PlaybackTracker {
    belief: Mutex<PlaybackBelief>,
}

impl PlaybackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: &TimedEvent) {
        let mut belief = self.lock();
        belief.apply(event);
        debug!(
            event = ?event.event,
            status = ?belief.status,
            video_id = belief.current_video_id.as_deref().unwrap_or("-"),
            "Applied playback event"
        );
    }

    pub fn snapshot(&self, fudge_seconds: f64) -> SnapshotRecord {
        self.snapshot_at(fudge_seconds, Utc::now())
    }

    pub fn snapshot_at(&self, fudge_seconds: f64, now: DateTime<Utc>) -> SnapshotRecord {
        render(&self.lock(), fudge_seconds, now)
    }

    /// Copy of the raw belief.
    pub fn belief(&self) -> PlaybackBelief {
        self.lock().clone()
    }

    // A panic while holding the lock cannot leave the belief half-written in a
    // way readers care about, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, PlaybackBelief> {
        self.belief.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
