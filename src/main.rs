use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gallery_server::config::{Args, Config, ExtensionFilter};
use gallery_server::gallery::Gallery;
use gallery_server::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging; RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Arc::new(Config::load(Args::parse())?);
    log_config(&config);

    let gallery = Gallery::open(Arc::clone(&config))?;
    let store = gallery.store();
    let thumbnail_count = store.record_count()?;
    info!(
        db = %store.path().display(),
        db_id = store.database_id(),
        "Gallery server initialized with {} known thumbnails",
        thumbnail_count
    );

    server::run(Arc::new(gallery)).await
}

/// Startup banner with the effective configuration
fn log_config(config: &Config) {
    info!(root = %config.media_root.display(), "Serving media root");

    match &config.extensions {
        ExtensionFilter::AllowAll => info!("All file extensions are allowed"),
        ExtensionFilter::AllowList(set) => {
            let mut extensions: Vec<&str> = set.iter().map(String::as_str).collect();
            extensions.sort_unstable();
            info!("Allowed extensions: {}", extensions.join(", "));
        }
    }

    let mut blacklist: Vec<&str> = config.blacklist.iter().map(String::as_str).collect();
    blacklist.sort_unstable();
    info!("Blacklisted folders: {}", blacklist.join(", "));

    info!(
        dir = %config.thumbnail_dir.display(),
        width = config.thumbnail_size.width,
        height = config.thumbnail_size.height,
        "Thumbnail cache"
    );
    info!(
        field_width = config.field_width,
        public_url = %config.public_url,
        "Listing format"
    );
}
