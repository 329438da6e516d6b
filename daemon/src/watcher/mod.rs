//! Log following, parsing and playback tracking.

pub mod file_watcher;
pub mod history;
pub mod log_parser;
pub mod playback_tracker;
pub mod snapshot;
pub mod worker;

pub use file_watcher::{FollowTarget, LogFollower};
pub use history::{process_history, ProcessingStats};
pub use log_parser::{classify, LogEvent, TimedEvent};
pub use playback_tracker::{PlaybackBelief, PlaybackStatus, PlaybackTracker, Source};
pub use snapshot::SnapshotRecord;
pub use worker::LogSource;
