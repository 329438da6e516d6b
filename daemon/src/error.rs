//! Error types for vrcsync.

use std::path::PathBuf;

use thiserror::Error;

/// vrcsync error type.
///
/// Only startup and boundary code returns these. The playback tracker itself
/// never fails.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Config not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Replay file not found: {0}")]
    ReplayNotFound(PathBuf),

    #[error("Log directory not found: {0}")]
    LogDirNotFound(PathBuf),

    #[error("No {pattern} found in: {dir}")]
    NoLogFile { dir: PathBuf, pattern: String },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
