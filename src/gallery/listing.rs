/// Directory listing
///
/// Enumerates the direct children of a resolved directory into file URLs and
/// subfolder names, ready for the wire codec.
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use walkdir::WalkDir;

use super::resolver::ResolvedDir;
use crate::config::ExtensionFilter;

/// Synthetic first subfolder of every non-root listing
pub const PARENT_ENTRY: &str = "..";

/// Order applied to file entries. Subfolders always keep enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Lexicographic by rendered URL
    Name,
    /// Most recently modified first
    Date,
    /// Enumeration order
    Unsorted,
}

impl SortMode {
    /// Missing means `Name`; unknown values leave enumeration order.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("name") => SortMode::Name,
            Some("date") => SortMode::Date,
            Some(_) => SortMode::Unsorted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    pub display_path: String,
    pub subfolders: Vec<String>,
    /// Absolute file URLs
    pub files: Vec<String>,
}

struct FileEntry {
    url: String,
    modified: SystemTime,
}

impl Listing {
    /// Empty listing for a blacklisted directory; the header stays intact.
    pub fn blocked(dir: &ResolvedDir) -> Self {
        Listing { display_path: dir.display_path.clone(), ..Listing::default() }
    }

    /// Enumerate `dir` and apply `sort`.
    pub fn scan(
        dir: &ResolvedDir,
        filter: &ExtensionFilter,
        base_url: &str,
        sort: SortMode,
    ) -> io::Result<Self> {
        if dir.blocked {
            return Ok(Self::blocked(dir));
        }

        let mut subfolders = Vec::new();
        if !dir.is_root() {
            subfolders.push(PARENT_ENTRY.to_string());
        }
        let mut files = Vec::new();

        // Followed links report their target's type. A link back to this
        // directory or an ancestor is a walkdir loop error and is skipped, so
        // clients never see an endlessly nested folder.
        for entry in WalkDir::new(&dir.path).min_depth(1).max_depth(1).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => {
                    debug!(%err, "Skipping unreadable entry");
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                subfolders.push(name);
            } else if file_type.is_file() && filter.allows(entry.path()) {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(UNIX_EPOCH);
                files.push(FileEntry { url: file_url(base_url, &dir.relative, &name), modified });
            }
        }

        // Stable sorts, so ties keep enumeration order
        match sort {
            SortMode::Name => files.sort_by(|a, b| a.url.cmp(&b.url)),
            SortMode::Date => files.sort_by(|a, b| b.modified.cmp(&a.modified)),
            SortMode::Unsorted => {}
        }

        Ok(Listing {
            display_path: dir.display_path.clone(),
            subfolders,
            files: files.into_iter().map(|f| f.url).collect(),
        })
    }
}

/// `{base}/files/{relative}/{name}`, with only the file name percent-encoded.
pub fn file_url(base_url: &str, relative: &str, name: &str) -> String {
    let name = urlencoding::encode(name);
    if relative.is_empty() {
        format!("{base_url}/files/{name}")
    } else {
        format!("{base_url}/files/{relative}/{name}")
    }
}
