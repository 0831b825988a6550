//! Error model shared by the gallery core and the HTTP boundary.

use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GalleryError>;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Attempted directory traversal attack with path: {0}")]
    Traversal(String),
    #[error("Requested subfolder does not exist: {0}")]
    NotADirectory(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),
    #[error("thumbnail database error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("there was an i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("error while processing the image (via the `image` crate): {0}")]
    Image(#[from] image::ImageError),
    #[error("there was an i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("thumbnail database error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("failed to move the thumbnail into the cache: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl GalleryError {
    /// Map to the HTTP status returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GalleryError::Traversal(_) | GalleryError::NotADirectory(_) => StatusCode::BAD_REQUEST,
            GalleryError::AccessDenied(_) => StatusCode::FORBIDDEN,
            GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
            GalleryError::Thumbnail(_)
            | GalleryError::Store(_)
            | GalleryError::Io(_)
            | GalleryError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body text for the client. Client errors only echo the submitted path;
    /// server errors never expose internal detail.
    pub fn client_message(&self) -> String {
        match self {
            GalleryError::Traversal(_) | GalleryError::NotADirectory(_) => format!("Error: {self}"),
            GalleryError::AccessDenied(_) => "Access denied".to_string(),
            GalleryError::NotFound(_) => "File not found".to_string(),
            GalleryError::Thumbnail(_) => "Thumbnail generation failed".to_string(),
            GalleryError::Store(_) | GalleryError::Io(_) | GalleryError::Task(_) => {
                "Internal Server Error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_echo_the_request() {
        let err = GalleryError::NotADirectory("vacation/missing".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.client_message(),
            "Error: Requested subfolder does not exist: vacation/missing"
        );
    }

    #[test]
    fn server_errors_hide_detail() {
        let err = GalleryError::Io(std::io::Error::other("disk on fire"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal Server Error");

        let err = GalleryError::from(ThumbnailError::Io(std::io::Error::other("boom")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Thumbnail generation failed");
    }
}
