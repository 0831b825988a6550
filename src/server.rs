//! HTTP surface: listing, original file and thumbnail endpoints.

use anyhow::Context;
use axum::{
    extract::{Path, Query, Request, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::{services::ServeFile, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::error::{GalleryError, Result};
use crate::gallery::listing::SortMode;
use crate::gallery::Gallery;

pub type SharedGallery = Arc<Gallery>;

#[derive(Deserialize, Debug, Default)]
pub struct ListingQuery {
    sort_by: Option<String>,
}

pub fn router(gallery: SharedGallery) -> Router {
    Router::new()
        .route("/", get(|| async { "gallery-server ok" }))
        // POST because the client cannot send a body with a GET request
        .route("/get-files", post(get_files))
        .route("/files/*filepath", get(serve_file))
        .route("/thumbs/*filepath", get(serve_thumbnail))
        .layer(TraceLayer::new_for_http())
        .with_state(gallery)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run(gallery: SharedGallery) -> anyhow::Result<()> {
    let addr = gallery.config().bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!("Starting gallery server on {}", addr);
    axum::serve(listener, router(gallery))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping");
}

/// The raw body is the requested subfolder.
async fn get_files(
    State(gallery): State<SharedGallery>,
    Query(query): Query<ListingQuery>,
    body: String,
) -> Response {
    let subfolder = body.trim().to_string();
    if subfolder.is_empty() {
        info!("No subfolder name defined, using root directory");
    }
    let sort = SortMode::parse(query.sort_by.as_deref());

    match run_blocking(move || gallery.list(&subfolder, sort)).await {
        Ok(wire) => wire.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn serve_file(
    State(gallery): State<SharedGallery>,
    Path(filepath): Path<String>,
    request: Request,
) -> Response {
    match run_blocking(move || gallery.file(&filepath)).await {
        Ok(path) => send_file(&path, request).await,
        Err(err) => err.into_response(),
    }
}

async fn serve_thumbnail(
    State(gallery): State<SharedGallery>,
    Path(filepath): Path<String>,
    request: Request,
) -> Response {
    match run_blocking(move || gallery.thumbnail(&filepath)).await {
        Ok(path) => send_file(&path, request).await,
        Err(err) => err.into_response(),
    }
}

/// Stream a resolved file; content type comes from its extension.
async fn send_file(path: &std::path::Path, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Filesystem, SQLite and image work stay off the async workers.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(err = %self, "Request failed");
        } else {
            warn!(err = %self, "Request rejected");
        }
        (status, self.client_message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gallery::codec::ListingFrame;
    use axum::body::{to_bytes, Body};
    use axum::http::{self, header, StatusCode};
    use image::RgbImage;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: std::path::PathBuf,
        app: Router,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap().join("media");
        fs::create_dir_all(root.join("vacation")).unwrap();
        fs::create_dir_all(root.join("private")).unwrap();
        RgbImage::new(400, 200).save(root.join("photo.png")).unwrap();
        RgbImage::new(20, 20).save(root.join("vacation/beach one.jpg")).unwrap();
        RgbImage::new(20, 20).save(root.join("private/secret.png")).unwrap();
        fs::write(root.join("notes.txt"), b"hello").unwrap();

        let gallery = Gallery::open(Arc::new(Config::for_tests(&root, dir.path()))).unwrap();
        Fixture { _dir: dir, root, app: router(Arc::new(gallery)) }
    }

    async fn send(app: &Router, request: Request) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, body.to_vec())
    }

    fn get_request(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_listing(uri: &str, subfolder: &str) -> Request {
        http::Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(subfolder.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_check() {
        let fx = fixture();
        let (status, _, body) = send(&fx.app, get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"gallery-server ok");
    }

    #[tokio::test]
    async fn listing_is_plain_fixed_width_text() {
        let fx = fixture();
        let (status, content_type, body) =
            send(&fx.app, post_listing("/get-files?sort_by=name&session_id=42", " vacation \n")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/plain"));

        let frame = ListingFrame::parse(&String::from_utf8(body).unwrap(), 260).unwrap();
        assert_eq!(frame.display_path, "root/vacation");
        assert_eq!(frame.subfolders, vec![".."]);
        assert_eq!(
            frame.files,
            vec!["http://localhost:8443/files/vacation/beach%20one.jpg"]
        );
    }

    #[tokio::test]
    async fn blacklisted_listing_is_empty_not_an_error() {
        let fx = fixture();
        let (status, _, body) = send(&fx.app, post_listing("/get-files", "root/private")).await;
        assert_eq!(status, StatusCode::OK);

        let frame = ListingFrame::parse(&String::from_utf8(body).unwrap(), 260).unwrap();
        assert_eq!(frame.display_path, "root/private");
        assert!(frame.subfolders.is_empty() && frame.files.is_empty());
    }

    #[tokio::test]
    async fn bad_listing_requests_are_client_errors() {
        let fx = fixture();
        let (status, _, body) = send(&fx.app, post_listing("/get-files", "../..")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().starts_with("Error: "));

        let (status, _, _) = send(&fx.app, post_listing("/get-files", "nowhere")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn original_files_are_served() {
        let fx = fixture();
        let (status, content_type, body) = send(&fx.app, get_request("/files/photo.png")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("image/png"));
        assert_eq!(body, fs::read(fx.root.join("photo.png")).unwrap());

        let (status, _, _) = send(&fx.app, get_request("/files/vacation/beach%20one.jpg")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn listed_urls_serve_the_listed_file() {
        let fx = fixture();
        fs::create_dir_all(fx.root.join("root")).unwrap();
        RgbImage::new(10, 10).save(fx.root.join("root/pic.png")).unwrap();
        RgbImage::new(30, 30).save(fx.root.join("pic.png")).unwrap();

        let (_, _, body) = send(&fx.app, post_listing("/get-files", "root/root")).await;
        let frame = ListingFrame::parse(&String::from_utf8(body).unwrap(), 260).unwrap();
        assert_eq!(frame.display_path, "root/root");
        assert_eq!(frame.files, vec!["http://localhost:8443/files/root/pic.png"]);

        let path = frame.files[0].strip_prefix("http://localhost:8443").unwrap();
        let (status, _, served) = send(&fx.app, get_request(path)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(served, fs::read(fx.root.join("root/pic.png")).unwrap());

        let thumbs = path.replacen("/files/", "/thumbs/", 1);
        let (status, _, thumb) = send(&fx.app, get_request(&thumbs)).await;
        assert_eq!(status, StatusCode::OK);
        let thumb = image::load_from_memory(&thumb).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (10, 10));
    }

    #[tokio::test]
    async fn file_access_is_checked() {
        let fx = fixture();
        let (status, _, _) = send(&fx.app, get_request("/files/notes.txt")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = send(&fx.app, get_request("/files/%2E%2E/thumbnails.db")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = send(&fx.app, get_request("/files/missing.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = send(&fx.app, get_request("/files/private/secret.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn thumbnails_are_generated_and_served() {
        let fx = fixture();
        let (status, content_type, body) = send(&fx.app, get_request("/thumbs/photo.png")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("image/jpeg"));

        let thumb = image::load_from_memory(&body).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (200, 100));

        let (status, _, again) = send(&fx.app, get_request("/thumbs/photo.png")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again, body);

        let (status, _, _) = send(&fx.app, get_request("/thumbs/private/secret.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
