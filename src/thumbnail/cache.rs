use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use super::generate::write_thumbnail;
use crate::config::ThumbnailSize;
use crate::error::ThumbnailError;
use crate::state::store::ThumbnailStore;

type InFlight = Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// Disk-backed thumbnail cache keyed by the store's opaque identifiers.
///
/// Identifiers do not depend on file content: a source overwritten in place
/// keeps serving its old thumbnail. Entries are never evicted.
pub struct ThumbnailCache {
    store: Arc<ThumbnailStore>,
    cache_dir: PathBuf,
    size: ThumbnailSize,
    /// One lock per original file currently being generated
    in_flight: InFlight,
    /// Thumbnails encoded since startup
    generated: AtomicUsize,
}

impl ThumbnailCache {
    pub fn new(store: Arc<ThumbnailStore>, cache_dir: PathBuf, size: ThumbnailSize) -> io::Result<Self> {
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            store,
            cache_dir,
            size,
            in_flight: Mutex::new(HashMap::new()),
            generated: AtomicUsize::new(0),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Number of thumbnails this cache has encoded since it was created
    pub fn generated_count(&self) -> usize {
        self.generated.load(Ordering::Relaxed)
    }

    /// Get the thumbnail path for an identifier (doesn't generate, just returns the expected path)
    pub fn thumbnail_path(&self, thumbnail_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{thumbnail_id}.jpg"))
    }

    /// Return the cached thumbnail of `original`, generating it on first use.
    ///
    /// Concurrent callers for the same file wait for a single generation.
    /// Blocking; call from a blocking context.
    pub fn get_or_create(&self, original: &Path) -> Result<PathBuf, ThumbnailError> {
        let key = original.to_string_lossy().to_string();
        let thumbnail_id = self.store.thumbnail_id_for(&key)?;
        let path = self.thumbnail_path(&thumbnail_id);

        if path.exists() {
            return Ok(path);
        }

        let flight = self.acquire(&key);
        let result = {
            let _guard = flight.hold();
            // Another worker may have finished while we waited
            if path.exists() {
                Ok(())
            } else {
                info!(original = %original.display(), "Thumbnail not found, generating");
                write_thumbnail(original, &path, self.size).map(|()| {
                    self.generated.fetch_add(1, Ordering::Relaxed);
                })
            }
        };
        drop(flight);

        match result {
            Ok(()) => Ok(path),
            Err(err) => {
                error!(original = %original.display(), %err, "Failed to generate thumbnail");
                Err(err)
            }
        }
    }

    fn acquire<'a>(&'a self, key: &'a str) -> Flight<'a> {
        let mut in_flight = self.in_flight.lock();
        let lock = Arc::clone(in_flight.entry(key.to_string()).or_default());
        Flight { in_flight: &self.in_flight, key, lock: Some(lock) }
    }
}

/// A caller's share of a per-file lock. Dropping it, unwinding included,
/// forgets the lock once nobody else holds it.
struct Flight<'a> {
    in_flight: &'a InFlight,
    key: &'a str,
    /// Only `None` while dropping
    lock: Option<Arc<Mutex<()>>>,
}

impl Flight<'_> {
    fn hold(&self) -> Option<MutexGuard<'_, ()>> {
        self.lock.as_ref().map(|lock| lock.lock())
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock();
        drop(self.lock.take());
        if in_flight.get(self.key).is_some_and(|l| Arc::strong_count(l) == 1) {
            in_flight.remove(self.key);
        }
    }
}
