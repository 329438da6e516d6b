//! vrcsync - mirror the video playing in VRChat into a browser.
//!
//! Follows the VRChat output log, reconstructs what is playing and where,
//! and serves that over HTTP to a small YouTube viewer page.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod config;
mod error;
mod watcher;
mod web;

pub use config::Config;
pub use error::Error;

use watcher::{worker, FollowTarget, LogSource, PlaybackTracker};

#[derive(Parser)]
#[command(name = "vrcsync")]
#[command(about = "Mirror the video playing in VRChat into a browser")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.vrcsync/config.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing output_log_*.txt
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Follow this file instead of the newest log in the directory
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Replay a saved log from the start instead of following
    #[arg(long)]
    replay: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Default latency compensation in seconds for /state
    #[arg(long)]
    fudge: Option<f64>,

    /// Don't open the viewer in a browser
    #[arg(long)]
    no_browser: bool,

    /// Don't show the console status view
    #[arg(long)]
    no_tui: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.log_dir {
            config.log.dir = Some(dir.clone());
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(fudge) = self.fudge {
            config.server.default_fudge = fudge;
        }
    }

    fn log_source(&self, config: &Config) -> Result<LogSource, Error> {
        match &self.replay {
            Some(path) => LogSource::replay(path),
            None => FollowTarget::resolve(&config.log, self.log_file.as_deref())
                .map(LogSource::Follow),
        }
    }
}

fn main() -> Result<(), Error> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("vrcsync=info".parse().unwrap()))
        .init();

    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Err(e) = run(cli).await {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    });

    Ok(())
}

async fn run(cli: Cli) -> Result<(), Error> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    // Configuration problems are fatal here, before anything starts.
    let source = cli.log_source(&config)?;
    let listener = web::bind(&config.server.bind_addr()).await?;

    let tracker = Arc::new(PlaybackTracker::new());
    let cancel = CancellationToken::new();
    let viewer_url = config.server.viewer_url();

    let server = tokio::spawn(web::serve(
        listener,
        web::AppState {
            tracker: tracker.clone(),
            default_fudge: config.server.default_fudge,
        },
        cancel.clone(),
    ));
    println!("[ui] Open: {viewer_url}");

    if !cli.no_browser {
        let url = viewer_url.clone();
        tokio::task::spawn_blocking(move || web::open_browser(&url));
    }
    if !cli.no_tui {
        tokio::spawn(cli::console::run(
            tracker.clone(),
            viewer_url.clone(),
            config.server.default_fudge,
            config.server.console_refresh(),
            cancel.clone(),
        ));
    }

    println!("[log] Following: {}", source.describe());
    let worker = worker::spawn(source, config.log.clone(), tracker, cancel.clone())?;

    // A finished replay leaves the last state up until Ctrl+C.
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
    }
    info!("Shutting down");
    cancel.cancel();

    match tokio::task::spawn_blocking(move || worker.join()).await {
        Ok(Ok(stats)) => info!(
            lines = stats.lines_read,
            events = stats.events_applied,
            "Log worker finished"
        ),
        _ => warn!("Log worker did not shut down cleanly"),
    }
    match server.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "Web server task failed"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "vrcsync",
            "--log-dir",
            "/logs",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--fudge",
            "0.5",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.log.dir, Some(PathBuf::from("/logs")));
        assert_eq!(config.server.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.server.default_fudge, 0.5);
        assert!(!cli.no_browser);
    }

    #[test]
    fn replay_flag_selects_replay_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");
        std::fs::write(&path, "").unwrap();

        let cli = Cli::parse_from(["vrcsync", "--replay", path.to_str().unwrap()]);
        let source = cli.log_source(&Config::default()).unwrap();
        assert_eq!(source, LogSource::Replay(path));
    }

    #[test]
    fn missing_log_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("VRChat");
        let cli = Cli::parse_from(["vrcsync", "--log-dir", missing.to_str().unwrap()]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert!(matches!(
            cli.log_source(&config),
            Err(Error::LogDirNotFound(_))
        ));
    }
}
