//! Runtime configuration.
//!
//! Values come from an optional TOML file and are then overridden by CLI
//! flags. Every field has a default so an empty or missing file is valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::Error;

/// Floor for every polling period; a zero period would spin or panic.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub server: ServerConfig,
}

/// Where and how to read the VRChat log.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Directory holding rotated log files. `None` means the VRChat default.
    pub dir: Option<PathBuf>,
    pub file_prefix: String,
    pub file_suffix: String,
    pub poll_interval_ms: u64,
    pub retry_backoff_ms: u64,
    pub replay_pace_ms: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            file_prefix: "output_log_".to_string(),
            file_suffix: ".txt".to_string(),
            poll_interval_ms: 200,
            retry_backoff_ms: 500,
            replay_pace_ms: 10,
        }
    }
}

impl LogConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_PERIOD)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms).max(MIN_PERIOD)
    }

    pub fn replay_pace(&self) -> Duration {
        Duration::from_millis(self.replay_pace_ms)
    }

    /// Configured log directory, or the VRChat default under the home dir.
    pub fn resolve_dir(&self) -> Result<PathBuf, Error> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir().ok_or(Error::HomeDirNotFound)?;
        Ok(home
            .join("AppData")
            .join("LocalLow")
            .join("VRChat")
            .join("VRChat"))
    }

    /// Human-readable glob of the rotated file names, for messages.
    pub fn file_pattern(&self) -> String {
        format!("{}*{}", self.file_prefix, self.file_suffix)
    }
}

/// HTTP server and viewer settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Latency compensation used when `/state` has no `fudge` parameter.
    pub default_fudge: f64,
    pub console_refresh_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7957,
            default_fudge: 1.5,
            console_refresh_ms: 500,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn viewer_url(&self) -> String {
        format!("http://{}:{}/client", self.host, self.port)
    }

    pub fn console_refresh(&self) -> Duration {
        Duration::from_millis(self.console_refresh_ms).max(MIN_PERIOD)
    }
}

impl Config {
    /// Load config from an explicit path, or from `~/.vrcsync/config.toml`
    /// when it exists. An explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Error> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::ConfigNotFound(path.to_path_buf()));
                }
                Self::load_from(path)
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_from(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".vrcsync").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            [log]
            dir = "/var/log/vrchat"
            poll_interval_ms = 50

            [server]
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.log.dir, Some(PathBuf::from("/var/log/vrchat")));
        assert_eq!(config.log.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.log.file_prefix, "output_log_");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.default_fudge, 1.5);
    }

    #[test]
    fn zero_periods_are_raised_to_one_millisecond() {
        let config = Config::parse(
            "[log]\npoll_interval_ms = 0\nretry_backoff_ms = 0\nreplay_pace_ms = 0\n\
             [server]\nconsole_refresh_ms = 0\n",
        )
        .unwrap();
        assert_eq!(config.log.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.log.retry_backoff(), Duration::from_millis(1));
        assert_eq!(config.server.console_refresh(), Duration::from_millis(1));
        // Replay may run unpaced.
        assert_eq!(config.log.replay_pace(), Duration::ZERO);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let err = Config::parse("[server]\nport = \"eighty\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn explicit_missing_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(p) if p == missing));
    }

    #[test]
    fn explicit_path_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[log]\nfile_prefix = \"debug_log_\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log.file_prefix, "debug_log_");
        assert_eq!(config.log.file_pattern(), "debug_log_*.txt");
    }

    #[test]
    fn urls_are_built_from_host_and_port() {
        let server = ServerConfig::default();
        assert_eq!(server.bind_addr(), "127.0.0.1:7957");
        assert_eq!(server.viewer_url(), "http://127.0.0.1:7957/client");
    }
}
