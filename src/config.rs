/// Process configuration
///
/// Built once in `main` from defaults, an optional JSON file and command line
/// flags (highest precedence), then shared read-only with every component.
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Application directory name under the user's data and cache directories
const APP_DIR: &str = "gallery-server";

pub const DEFAULT_FIELD_WIDTH: usize = 260;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8443;
const DEFAULT_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];
const DEFAULT_BLACKLIST: [&str; 2] = ["ignore", "private"];

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Media root directory to expose
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,
    /// Base URL clients use to reach this server
    #[arg(long, value_name = "URL")]
    pub public_url: Option<String>,
    #[arg(long, value_name = "FILE")]
    pub db_path: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    pub thumbnail_dir: Option<PathBuf>,
}

/// Bounding box generated thumbnails must fit within
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self { width: 200, height: 200 }
    }
}

/// Which file extensions are eligible for listing and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionFilter {
    AllowAll,
    /// Lowercased extensions without the leading dot
    AllowList(HashSet<String>),
}

impl ExtensionFilter {
    /// Build a filter from configured extensions. Entries may carry a leading
    /// dot and any case; an empty list allows everything.
    pub fn from_list<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: HashSet<String> = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        if set.is_empty() {
            ExtensionFilter::AllowAll
        } else {
            ExtensionFilter::AllowList(set)
        }
    }

    pub fn allows(&self, path: &Path) -> bool {
        match self {
            ExtensionFilter::AllowAll => true,
            ExtensionFilter::AllowList(set) => path
                .extension()
                .map(|ext| set.contains(&ext.to_string_lossy().to_lowercase()))
                .unwrap_or(false),
        }
    }
}

/// On-disk shape of the JSON configuration file. Every key is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub media_root: Option<PathBuf>,
    pub allowed_extensions: Option<Vec<String>>,
    pub blacklisted_folders: Option<Vec<String>>,
    pub thumbnail_size: Option<ThumbnailSize>,
    pub thumbnail_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub field_width: Option<usize>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Canonicalized media root
    pub media_root: PathBuf,
    pub extensions: ExtensionFilter,
    /// Path segment names that are never listed or served
    pub blacklist: HashSet<String>,
    pub thumbnail_size: ThumbnailSize,
    pub thumbnail_dir: PathBuf,
    pub db_path: PathBuf,
    /// Width of every field in a listing response, delimiter included
    pub field_width: usize,
    pub host: String,
    pub port: u16,
    /// Base of the file URLs put in listings, without a trailing slash
    pub public_url: String,
}

impl Config {
    /// Load the configuration named by the command line.
    pub fn load(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => ConfigFile::read(path)?,
            None => ConfigFile::default(),
        };
        Self::from_sources(file, args)
    }

    /// Merge a parsed config file with command line overrides and validate.
    pub fn from_sources(file: ConfigFile, args: Args) -> Result<Self> {
        let Some(root) = args.root.or(file.media_root) else {
            bail!("no media root configured (use --root or \"media_root\" in the config file)");
        };
        let media_root = fs::canonicalize(&root)
            .with_context(|| format!("Root directory does not exist: {}", root.display()))?;
        if !media_root.is_dir() {
            bail!("Root path is not a directory: {}", media_root.display());
        }

        let extensions = match file.allowed_extensions {
            Some(list) => ExtensionFilter::from_list(list),
            None => ExtensionFilter::from_list(DEFAULT_EXTENSIONS),
        };

        let blacklist: HashSet<String> = match file.blacklisted_folders {
            Some(list) => list
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            None => DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
        };

        let thumbnail_size = file.thumbnail_size.unwrap_or_default();
        if thumbnail_size.width == 0 || thumbnail_size.height == 0 {
            bail!("thumbnail_size dimensions must be at least 1");
        }

        let field_width = file.field_width.unwrap_or(DEFAULT_FIELD_WIDTH);
        if field_width < 2 {
            bail!("field_width must be at least 2 (one character plus the delimiter)");
        }

        let thumbnail_dir = match args.thumbnail_dir.or(file.thumbnail_dir) {
            Some(dir) => dir,
            None => default_thumbnail_dir()?,
        };
        let db_path = match args.db_path.or(file.db_path) {
            Some(path) => path,
            None => default_db_path()?,
        };

        let host = args
            .host
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = args.port.or(file.port).unwrap_or(DEFAULT_PORT);
        let public_url = args
            .public_url
            .or(file.public_url)
            .unwrap_or_else(|| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            media_root,
            extensions,
            blacklist,
            thumbnail_size,
            thumbnail_dir,
            db_path,
            field_width,
            host,
            port,
            public_url,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Defaults around an already canonical `root`, keeping the database and
    /// thumbnails under `scratch`.
    #[cfg(test)]
    pub fn for_tests(root: &Path, scratch: &Path) -> Self {
        Config {
            media_root: root.to_path_buf(),
            extensions: ExtensionFilter::from_list(DEFAULT_EXTENSIONS),
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
            thumbnail_size: ThumbnailSize::default(),
            thumbnail_dir: scratch.join("thumbs"),
            db_path: scratch.join("thumbnails.db"),
            field_width: DEFAULT_FIELD_WIDTH,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            public_url: "http://localhost:8443".to_string(),
        }
    }
}

/// Default database location
/// - Linux: ~/.local/share/gallery-server/thumbnails.db
/// - macOS: ~/Library/Application Support/gallery-server/thumbnails.db
/// - Windows: %APPDATA%\gallery-server\thumbnails.db
fn default_db_path() -> Result<PathBuf> {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .context("Could not determine user data directory")?;
    path.push(APP_DIR);
    path.push("thumbnails.db");
    Ok(path)
}

/// Default thumbnail directory, ~/.cache/gallery-server/thumbnails on Linux
fn default_thumbnail_dir() -> Result<PathBuf> {
    let mut path = dirs::cache_dir()
        .or_else(dirs::home_dir)
        .context("Could not determine cache directory")?;
    path.push(APP_DIR);
    path.push("thumbnails");
    Ok(path)
}
