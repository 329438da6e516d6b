//! Embedded viewer page.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "src/web/static"]
struct Asset;

/// `GET /` and `GET /client`.
pub async fn viewer_page() -> Response {
    serve_asset("index.html")
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn serve_asset(path: &str) -> Response {
    match Asset::get(path) {
        Some(content) => response_for_asset(path, &content.data),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn response_for_asset(path: &str, data: &[u8]) -> Response {
    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    (
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        data.to_vec(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn viewer_page_is_html_and_polls_state() {
        let response = viewer_page().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("fetch('/state')"));
        assert!(html.contains("POLL_MS = 800"));
    }

    #[tokio::test]
    async fn unknown_paths_are_404() {
        assert_eq!(not_found().await.status(), StatusCode::NOT_FOUND);
        assert_eq!(serve_asset("nope.js").status(), StatusCode::NOT_FOUND);
    }
}
