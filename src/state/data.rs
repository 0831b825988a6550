/// Shared data structures for the persisted state
///
/// These structs represent the data model that flows between
/// the database layer and the thumbnail cache.

/// Maps one original media file to its thumbnail identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRecord {
    /// Absolute path of the original file (unique key)
    pub original_path: String,
    /// Opaque identifier; the cached file is `{thumbnail_id}.jpg`
    pub thumbnail_id: String,
    /// Unix timestamp of the first thumbnail request
    pub created_at: i64,
}
