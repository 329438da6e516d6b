//! HTTP surface: the state endpoint and the embedded viewer page.

mod assets;
mod state;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Error;
use crate::watcher::PlaybackTracker;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<PlaybackTracker>,
    pub default_fudge: f64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(assets::viewer_page))
        .route("/client", get(assets::viewer_page))
        .route("/state", get(state::get_state))
        .fallback(assets::not_found)
        .with_state(state)
}

/// Bind the listener up front so a busy port is a startup error.
pub async fn bind(addr: &str) -> Result<TcpListener, Error> {
    TcpListener::bind(addr).await.map_err(|source| Error::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serve until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Web server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    debug!("Web server stopped");
    Ok(())
}

/// Open the viewer in the default browser, ignoring failures.
pub fn open_browser(url: &str) {
    if let Err(e) = webbrowser::open(url) {
        debug!(error = %e, url, "Could not open browser");
    }
}
