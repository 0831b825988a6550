/// Client path resolution
///
/// Turns the raw, client-supplied relative path of a request into an
/// absolute path under the media root, enforcing containment, the blacklist
/// and (for files) the extension filter.
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::config::{Config, ExtensionFilter};
use crate::error::{GalleryError, Result};

/// Prefix of every display path; accepted (and stripped) on listing input
pub const ROOT_MARKER: &str = "root/";

/// A directory request after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDir {
    /// Absolute directory. Canonical unless `blocked`.
    pub path: PathBuf,
    /// Normalized path relative to the media root, `""` for the root itself
    pub relative: String,
    /// `root/`-prefixed form returned to clients
    pub display_path: String,
    /// A segment of the path is blacklisted; list nothing
    pub blocked: bool,
}

impl ResolvedDir {
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    blacklist: HashSet<String>,
    extensions: ExtensionFilter,
}

impl PathResolver {
    /// `config.media_root` must already be canonical.
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.media_root.clone(),
            blacklist: config.blacklist.clone(),
            extensions: config.extensions.clone(),
        }
    }

    pub fn extensions(&self) -> &ExtensionFilter {
        &self.extensions
    }

    /// Resolve a listing request.
    ///
    /// Blacklisted paths are not an error: they come back `blocked`, without
    /// touching the filesystem, so a client cannot probe what exists below them.
    pub fn resolve_dir(&self, raw: &str) -> Result<ResolvedDir> {
        let segments = normalize(strip_root_marker(raw)).ok_or_else(|| {
            warn!(path = raw, "Directory traversal attempt");
            GalleryError::Traversal(raw.to_string())
        })?;
        let relative = segments.join("/");
        let display_path = display_path_for(&relative);

        if self.is_blacklisted(&segments) {
            return Ok(ResolvedDir {
                path: self.root.join(&relative),
                relative,
                display_path,
                blocked: true,
            });
        }

        let canonical = fs::canonicalize(self.root.join(&relative))
            .map_err(|_| GalleryError::NotADirectory(relative.clone()))?;

        // Component-wise, so a sibling like `/media2` never passes for `/media`
        if !canonical.starts_with(&self.root) {
            warn!(path = raw, "Directory traversal attempt through a link");
            return Err(GalleryError::Traversal(raw.to_string()));
        }

        if !canonical.is_dir() {
            return Err(GalleryError::NotADirectory(relative));
        }

        Ok(ResolvedDir { path: canonical, relative, display_path, blocked: false })
    }

    /// Resolve a file or thumbnail request to an existing, servable file.
    ///
    /// File URLs carry the bare relative path, so `root/` here is an
    /// ordinary folder name.
    pub fn resolve_file(&self, raw: &str) -> Result<PathBuf> {
        let segments = normalize(raw).ok_or_else(|| {
            warn!(path = raw, "Security alert: attempted access outside root");
            GalleryError::AccessDenied(raw.to_string())
        })?;

        if segments.is_empty() || self.is_blacklisted(&segments) {
            return Err(GalleryError::NotFound(raw.to_string()));
        }

        let requested = self.root.join(segments.join("/"));
        let canonical = fs::canonicalize(&requested)
            .map_err(|_| GalleryError::NotFound(raw.to_string()))?;

        if !canonical.starts_with(&self.root) {
            warn!(path = raw, "Security alert: attempted access outside root");
            return Err(GalleryError::AccessDenied(raw.to_string()));
        }

        if !canonical.is_file() {
            return Err(GalleryError::NotFound(raw.to_string()));
        }

        if !self.extensions.allows(&requested) {
            warn!(path = raw, "Forbidden file type requested");
            return Err(GalleryError::AccessDenied(raw.to_string()));
        }

        Ok(canonical)
    }

    fn is_blacklisted(&self, segments: &[String]) -> bool {
        match segments.iter().find(|s| self.blacklist.contains(s.as_str())) {
            Some(name) => {
                warn!(segment = %name, "Access denied: requested path contains a blacklisted name");
                true
            }
            None => false,
        }
    }
}

fn strip_root_marker(raw: &str) -> &str {
    raw.strip_prefix(ROOT_MARKER).unwrap_or(raw)
}

/// Lexically normalize a relative path into its segments.
///
/// Both separators are accepted, empty and `.` segments vanish and `..` pops
/// the previous segment. Returns `None` when `..` would climb above the root.
pub fn normalize(raw: &str) -> Option<Vec<String>> {
    let mut segments: Vec<String> = Vec::new();
    for segment in raw.split(|c: char| c == '/' || c == '\\') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            name => segments.push(name.to_string()),
        }
    }
    Some(segments)
}

/// `root/`-prefixed display form of a normalized relative path
pub fn display_path_for(relative: &str) -> String {
    format!("{ROOT_MARKER}{relative}")
}
