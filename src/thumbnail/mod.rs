/// Thumbnail module
///
/// This module handles:
/// - Mapping original files to cached thumbnails (cache.rs)
/// - Decoding, resizing and JPEG-encoding source images (generate.rs)

pub mod cache;
pub mod generate;

pub use cache::ThumbnailCache;
