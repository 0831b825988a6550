/// Gallery core
///
/// This module handles:
/// - Resolving client paths against the media root (resolver.rs)
/// - Enumerating and sorting directory entries (listing.rs)
/// - The fixed-width listing wire format (codec.rs)
///
/// `Gallery` ties them to the thumbnail store and cache; every request
/// handler goes through it.

pub mod codec;
pub mod listing;
pub mod resolver;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::state::store::ThumbnailStore;
use crate::thumbnail::ThumbnailCache;
use codec::encode_listing;
use listing::{Listing, SortMode};
use resolver::PathResolver;

pub struct Gallery {
    config: Arc<Config>,
    resolver: PathResolver,
    store: Arc<ThumbnailStore>,
    thumbnails: ThumbnailCache,
}

impl Gallery {
    /// Open the thumbnail store and cache directory named by `config`,
    /// creating them if needed.
    pub fn open(config: Arc<Config>) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let store = Arc::new(ThumbnailStore::open(&config.db_path)?);
        let thumbnails = ThumbnailCache::new(
            Arc::clone(&store),
            config.thumbnail_dir.clone(),
            config.thumbnail_size,
        )?;

        Ok(Gallery { resolver: PathResolver::new(&config), config, store, thumbnails })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ThumbnailStore {
        &self.store
    }

    /// Encoded listing of the directory named by `raw`.
    pub fn list(&self, raw: &str, sort: SortMode) -> Result<String> {
        let dir = self.resolver.resolve_dir(raw)?;
        info!(
            requested = raw,
            relative = %dir.relative,
            blocked = dir.blocked,
            "Listing directory"
        );

        let listing = Listing::scan(&dir, self.resolver.extensions(), &self.config.public_url, sort)?;
        Ok(encode_listing(self.store.database_id(), &listing, self.config.field_width))
    }

    /// Absolute path of the original file named by `raw`.
    pub fn file(&self, raw: &str) -> Result<PathBuf> {
        self.resolver.resolve_file(raw)
    }

    /// Absolute path of the cached thumbnail for the file named by `raw`,
    /// generated on first request. Blocking.
    pub fn thumbnail(&self, raw: &str) -> Result<PathBuf> {
        let original = self.resolver.resolve_file(raw)?;
        Ok(self.thumbnails.get_or_create(&original)?)
    }
}

#[cfg(test)]
mod tests {
    use super::codec::ListingFrame;
    use super::*;
    use crate::error::GalleryError;
    use image::RgbImage;
    use std::path::Path;

    struct Fixture {
        dir: tempfile::TempDir,
        root: PathBuf,
        gallery: Gallery,
    }

    fn open_gallery(root: &Path, scratch: &Path) -> Gallery {
        Gallery::open(Arc::new(Config::for_tests(root, scratch))).unwrap()
    }

    /// media/photo.png, media/vacation/beach.jpg, media/ignore/x/hidden.png
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap().join("media");
        fs::create_dir_all(root.join("vacation")).unwrap();
        fs::create_dir_all(root.join("ignore/x")).unwrap();
        RgbImage::new(300, 300).save(root.join("photo.png")).unwrap();
        RgbImage::new(300, 100).save(root.join("vacation/beach.jpg")).unwrap();
        RgbImage::new(10, 10).save(root.join("ignore/x/hidden.png")).unwrap();

        let gallery = open_gallery(&root, dir.path());
        Fixture { dir, root, gallery }
    }

    fn list(fx: &Fixture, raw: &str) -> ListingFrame {
        let wire = fx.gallery.list(raw, SortMode::Name).unwrap();
        ListingFrame::parse(&wire, fx.gallery.config().field_width).unwrap()
    }

    #[test]
    fn root_listing_example() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap().join("media");
        fs::create_dir_all(root.join("vacation")).unwrap();
        RgbImage::new(8, 8).save(root.join("photo.png")).unwrap();
        let gallery = open_gallery(&root, dir.path());

        let wire = gallery.list("", SortMode::Name).unwrap();
        let frame = ListingFrame::parse(&wire, 260).unwrap();
        assert_eq!(frame.display_path, "root/");
        assert_eq!(frame.subfolders, vec!["vacation"]);
        assert_eq!(frame.files, vec!["http://localhost:8443/files/photo.png"]);

        // Counts sit at fields 2 and 3
        let chars: Vec<char> = wire.chars().collect();
        assert_eq!(chars[2 * 260], '1');
        assert_eq!(chars[3 * 260], '1');
    }

    #[test]
    fn root_listing_shows_every_subfolder() {
        let fx = fixture();
        let mut frame = list(&fx, "");
        frame.subfolders.sort();
        assert_eq!(frame.subfolders, vec!["ignore", "vacation"]);
    }

    #[test]
    fn subfolder_listing_starts_with_parent() {
        let fx = fixture();
        let frame = list(&fx, "vacation");

        assert_eq!(frame.display_path, "root/vacation");
        assert_eq!(frame.subfolders, vec![".."]);
        assert_eq!(frame.files, vec!["http://localhost:8443/files/vacation/beach.jpg"]);
    }

    #[test]
    fn blacklisted_listing_keeps_the_header() {
        let fx = fixture();
        let frame = list(&fx, "ignore/x");

        assert_eq!(frame.database_id, fx.gallery.store().database_id());
        assert_eq!(frame.display_path, "root/ignore/x");
        assert!(frame.subfolders.is_empty());
        assert!(frame.files.is_empty());
    }

    #[test]
    fn database_id_is_stable_per_store() {
        let fx = fixture();
        let first = list(&fx, "").database_id;
        let second = list(&fx, "vacation").database_id;
        assert_eq!(first, second);

        let reopened = open_gallery(&fx.root, fx.dir.path());
        assert_eq!(reopened.store().database_id(), first);

        let other_scratch = tempfile::tempdir().unwrap();
        let fresh = open_gallery(&fx.root, other_scratch.path());
        assert_ne!(fresh.store().database_id(), first);
    }

    #[test]
    fn listing_errors_surface() {
        let fx = fixture();
        assert!(matches!(fx.gallery.list("../..", SortMode::Name), Err(GalleryError::Traversal(_))));
        assert!(matches!(
            fx.gallery.list("missing", SortMode::Name),
            Err(GalleryError::NotADirectory(_))
        ));
    }

    #[test]
    fn thumbnails_are_generated_once() {
        let fx = fixture();
        let first = fx.gallery.thumbnail("vacation/beach.jpg").unwrap();
        let modified = fs::metadata(&first).unwrap().modified().unwrap();

        let second = fx.gallery.thumbnail("./vacation//beach.jpg").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::metadata(&second).unwrap().modified().unwrap(), modified);
        assert_eq!(fx.gallery.store().record_count().unwrap(), 1);
    }

    #[test]
    fn thumbnails_respect_the_blacklist() {
        let fx = fixture();
        assert!(matches!(
            fx.gallery.thumbnail("ignore/x/hidden.png"),
            Err(GalleryError::NotFound(_))
        ));
        assert_eq!(fx.gallery.store().record_count().unwrap(), 0);
    }

    #[test]
    fn files_resolve_inside_the_root() {
        let fx = fixture();
        assert_eq!(fx.gallery.file("photo.png").unwrap(), fx.root.join("photo.png"));
    }
}
