//! Tail the newest VRChat log file across rotation and truncation.
//!
//! VRChat starts a fresh `output_log_<timestamp>.txt` per session. The
//! follower always reads the lexicographically-last match, starting at its
//! end, and switches when a newer file appears or the current one shrinks.
//! Lines left unread in an abandoned file are dropped.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LogConfig;
use crate::error::Error;

/// Upper bound on lines returned by one [`LogFollower::poll`].
const MAX_LINES_PER_POLL: usize = 1024;

/// What to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowTarget {
    /// Newest file in `dir` named `<prefix>...<suffix>`.
    Directory {
        dir: PathBuf,
        prefix: String,
        suffix: String,
    },
    /// One fixed path; only shrinking or disappearing counts as rotation.
    File(PathBuf),
}

impl FollowTarget {
    /// Pick the target at startup. A missing directory or an empty one is a
    /// configuration error; everything after startup is retried silently.
    pub fn resolve(config: &LogConfig, log_file: Option<&Path>) -> Result<Self, Error> {
        if let Some(file) = log_file {
            if file.is_file() {
                return Ok(Self::File(file.to_path_buf()));
            }
            warn!(path = %file.display(), "Log file not found, falling back to log directory");
        }

        let dir = config.resolve_dir()?;
        if !dir.is_dir() {
            return Err(Error::LogDirNotFound(dir));
        }

        let target = Self::Directory {
            dir: dir.clone(),
            prefix: config.file_prefix.clone(),
            suffix: config.file_suffix.clone(),
        };
        match target.latest()? {
            Some(_) => Ok(target),
            None => Err(Error::NoLogFile {
                dir,
                pattern: config.file_pattern(),
            }),
        }
    }

    /// The file that should currently be followed, if any exists.
    pub fn latest(&self) -> io::Result<Option<PathBuf>> {
        match self {
            Self::File(path) => Ok(path.is_file().then(|| path.clone())),
            Self::Directory {
                dir,
                prefix,
                suffix,
            } => {
                let mut latest: Option<PathBuf> = None;
                for entry in fs::read_dir(dir)? {
                    let Ok(entry) = entry else {
                        continue;
                    };
                    let name = entry.file_name();
                    let Some(name) = name.to_str() else {
                        continue;
                    };
                    if !is_rotated_name(name, prefix, suffix) {
                        continue;
                    }
                    let path = entry.path();
                    if !path.is_file() {
                        continue;
                    }
                    if latest.as_ref().map_or(true, |current| path > *current) {
                        latest = Some(path);
                    }
                }
                Ok(latest)
            }
        }
    }

    fn watch_dir(&self) -> Option<PathBuf> {
        match self {
            Self::Directory { dir, .. } => Some(dir.clone()),
            Self::File(path) => path.parent().map(|parent| {
                if parent.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    parent.to_path_buf()
                }
            }),
        }
    }
}

fn is_rotated_name(name: &str, prefix: &str, suffix: &str) -> bool {
    name.len() >= prefix.len() + suffix.len() && name.starts_with(prefix) && name.ends_with(suffix)
}

/// One complete line read from a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowedLine {
    pub path: PathBuf,
    pub line: String,
}

/// Open file plus how far into it we have read.
#[derive(Debug)]
pub struct LogCursor {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    partial: Vec<u8>,
}

impl LogCursor {
    /// Open positioned at end-of-file; earlier history is skipped.
    pub fn open_at_end(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let offset = file.seek(SeekFrom::End(0))?;
        Ok(Self::with_file(path, file, offset))
    }

    pub fn open_at_start(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::with_file(path, file, 0))
    }

    fn with_file(path: &Path, file: File, offset: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            offset,
            partial: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Next newline-terminated line, without its line ending. A trailing
    /// fragment stays buffered until the rest of it is written.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let read = self.reader.read_until(b'\n', &mut self.partial)?;
            if read == 0 {
                return Ok(None);
            }
            self.offset += read as u64;
            if self.partial.last() == Some(&b'\n') {
                let line = String::from_utf8_lossy(&self.partial)
                    .trim_end_matches(&['\n', '\r'][..])
                    .to_string();
                self.partial.clear();
                return Ok(Some(line));
            }
        }
    }

    /// Drain the buffered unterminated fragment, if any. For files that are
    /// complete, where a last line without a newline will never be finished.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.partial)
            .trim_end_matches('\r')
            .to_string();
        self.partial.clear();
        Some(line)
    }
}

struct FsWake {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<notify::Event>>,
}

/// Polling log tail. See the module docs for the rotation policy.
pub struct LogFollower {
    target: FollowTarget,
    cursor: Option<LogCursor>,
    poll_interval: Duration,
    retry_backoff: Duration,
    wake: Option<FsWake>,
}

impl LogFollower {
    pub fn new(target: FollowTarget, config: &LogConfig) -> Self {
        Self {
            target,
            cursor: None,
            poll_interval: config.poll_interval(),
            retry_backoff: config.retry_backoff(),
            wake: None,
        }
    }

    /// Wake early on file-system changes in the log directory. Polling still
    /// runs on its interval; if the watcher can't be set up only polling is
    /// used.
    pub fn with_fs_notifications(mut self) -> Self {
        let Some(dir) = self.target.watch_dir() else {
            return self;
        };
        let (tx, events) = mpsc::channel::<notify::Result<notify::Event>>();
        let watcher = notify::recommended_watcher(tx).and_then(|mut watcher| {
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            Ok(watcher)
        });
        match watcher {
            Ok(watcher) => {
                debug!(dir = %dir.display(), "Watching log directory for changes");
                self.wake = Some(FsWake {
                    _watcher: watcher,
                    events,
                });
            }
            Err(e) => warn!(error = %e, "File notifications unavailable, polling only"),
        }
        self
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.cursor.as_ref().map(LogCursor::path)
    }

    /// Read whatever complete lines are available right now. When there are
    /// none, check for rotation or truncation. Never blocks and never fails;
    /// I/O problems drop the cursor so the next poll starts over.
    pub fn poll(&mut self) -> Vec<FollowedLine> {
        if self.cursor.is_none() && !self.open_latest() {
            return Vec::new();
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Vec::new();
        };

        let mut lines = Vec::new();
        while lines.len() < MAX_LINES_PER_POLL {
            match cursor.read_line() {
                Ok(Some(line)) => lines.push(FollowedLine {
                    path: cursor.path.clone(),
                    line,
                }),
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %cursor.path.display(), error = %e, "Log read failed, reopening");
                    self.cursor = None;
                    return lines;
                }
            }
        }

        if lines.is_empty() {
            self.check_rotation();
        }
        lines
    }

    fn open_latest(&mut self) -> bool {
        let path = match self.target.latest() {
            Ok(Some(path)) => path,
            Ok(None) => {
                debug!("No log file to follow yet");
                return false;
            }
            Err(e) => {
                debug!(error = %e, "Failed to list log files");
                return false;
            }
        };
        match LogCursor::open_at_end(&path) {
            Ok(cursor) => {
                info!(path = %path.display(), offset = cursor.offset, "Following log file");
                self.cursor = Some(cursor);
                true
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Failed to open log file");
                false
            }
        }
    }

    fn check_rotation(&mut self) {
        let Some(cursor) = &self.cursor else {
            return;
        };
        let current = cursor.path.clone();

        let shrunk = match fs::metadata(&current) {
            Ok(meta) => meta.len() < cursor.offset,
            Err(_) => true,
        };
        if shrunk {
            info!(path = %current.display(), "Log file truncated or removed, reopening");
            self.cursor = None;
            self.open_latest();
            return;
        }

        let latest = match self.target.latest() {
            Ok(Some(latest)) if latest != current => latest,
            _ => return,
        };
        match LogCursor::open_at_end(&latest) {
            Ok(next) => {
                info!(
                    from = %current.display(),
                    to = %latest.display(),
                    "Log rotated, switching file"
                );
                self.cursor = Some(next);
            }
            Err(e) => debug!(path = %latest.display(), error = %e, "Failed to open rotated log"),
        }
    }

    /// Sleep one bounded interval, returning early on a file-system event.
    fn wait(&mut self) {
        let delay = if self.cursor.is_some() {
            self.poll_interval
        } else {
            self.retry_backoff
        };

        let Some(wake) = &self.wake else {
            thread::sleep(delay);
            return;
        };
        let disconnected = match wake.events.recv_timeout(delay) {
            Ok(_) => {
                while wake.events.try_recv().is_ok() {}
                false
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => true,
        };
        if disconnected {
            self.wake = None;
        }
    }

    /// Endless, blocking line sequence that ends only when `cancel` fires.
    pub fn lines(self, cancel: CancellationToken) -> FollowLines {
        FollowLines {
            follower: self,
            cancel,
            buffered: VecDeque::new(),
        }
    }
}

/// Iterator returned by [`LogFollower::lines`].
pub struct FollowLines {
    follower: LogFollower,
    cancel: CancellationToken,
    buffered: VecDeque<FollowedLine>,
}

impl Iterator for FollowLines {
    type Item = FollowedLine;

    fn next(&mut self) -> Option<FollowedLine> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            if let Some(line) = self.buffered.pop_front() {
                return Some(line);
            }
            let lines = self.follower.poll();
            if lines.is_empty() {
                self.follower.wait();
            } else {
                self.buffered.extend(lines);
            }
        }
    }
}
