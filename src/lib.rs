//! Exposes a media folder to constrained remote clients: fixed-width
//! directory listings, original files and lazily generated, persistently
//! cached thumbnails.

pub mod config;
pub mod error;
pub mod gallery;
pub mod server;
pub mod state;
pub mod thumbnail;
