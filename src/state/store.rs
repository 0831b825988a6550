use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::data::ThumbnailRecord;

/// How long a connection waits on a write lock held by another request
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The ThumbnailStore manages the SQLite database that maps original files
/// to thumbnail identifiers, plus the identifier of the database itself.
///
/// `rusqlite::Connection` is not `Sync`, so instead of sharing one connection
/// between request workers every operation opens its own short-lived one.
pub struct ThumbnailStore {
    db_path: PathBuf,
    db_id: String,
}

impl ThumbnailStore {
    /// Open (or create) the store at `db_path` and initialize its schema.
    ///
    /// The database identifier is generated the first time the file is
    /// initialized and read back unchanged on every later open.
    pub fn open(db_path: impl Into<PathBuf>) -> SqlResult<Self> {
        let db_path = db_path.into();
        let conn = open_connection(&db_path)?;
        init_schema(&conn)?;

        let db_id: String =
            conn.query_row("SELECT db_id FROM metadata WHERE id = 1", [], |row| row.get(0))?;

        info!(path = %db_path.display(), %db_id, "Thumbnail database initialized");

        Ok(ThumbnailStore { db_path, db_id })
    }

    /// Identifier of this database, stable for the lifetime of the file
    pub fn database_id(&self) -> &str {
        &self.db_id
    }

    /// Location of the SQLite file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get a count of thumbnail mappings in the store
    pub fn record_count(&self) -> SqlResult<i64> {
        let conn = self.connect()?;
        conn.query_row("SELECT COUNT(*) FROM thumbnails", [], |row| row.get(0))
    }

    /// Look up the mapping for an original file, if one was ever created
    pub fn lookup(&self, original_path: &str) -> SqlResult<Option<ThumbnailRecord>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT original_path, thumbnail_id, created_at FROM thumbnails WHERE original_path = ?1",
            [original_path],
            |row| {
                Ok(ThumbnailRecord {
                    original_path: row.get(0)?,
                    thumbnail_id: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()
    }

    /// Return the thumbnail identifier for an original file, creating the
    /// mapping on first use.
    ///
    /// Two workers racing on the same path both attempt the insert; the
    /// loser's row is ignored and both read back the winner's identifier.
    pub fn thumbnail_id_for(&self, original_path: &str) -> SqlResult<String> {
        let conn = self.connect()?;

        if let Some(id) = select_thumbnail_id(&conn, original_path)? {
            return Ok(id);
        }

        let candidate = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT OR IGNORE INTO thumbnails (original_path, thumbnail_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![original_path, candidate, Utc::now().timestamp()],
        )?;

        conn.query_row(
            "SELECT thumbnail_id FROM thumbnails WHERE original_path = ?1",
            [original_path],
            |row| row.get(0),
        )
    }

    fn connect(&self) -> SqlResult<Connection> {
        open_connection(&self.db_path)
    }
}

fn open_connection(db_path: &Path) -> SqlResult<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Create both tables if they don't exist and seed the single metadata row.
fn init_schema(conn: &Connection) -> SqlResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS thumbnails (
            original_path   TEXT PRIMARY KEY,
            thumbnail_id    TEXT NOT NULL UNIQUE,
            created_at      INTEGER NOT NULL
        )",
        [],
    )?;

    // At most one row, ever
    conn.execute(
        "CREATE TABLE IF NOT EXISTS metadata (
            id              INTEGER PRIMARY KEY CHECK (id = 1),
            db_id           TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO metadata (id, db_id) VALUES (1, ?1)",
        [Uuid::new_v4().to_string()],
    )?;

    Ok(())
}

fn select_thumbnail_id(conn: &Connection, original_path: &str) -> SqlResult<Option<String>> {
    conn.query_row(
        "SELECT thumbnail_id FROM thumbnails WHERE original_path = ?1",
        [original_path],
        |row| row.get(0),
    )
    .optional()
}

// Implement Debug for better error messages
impl std::fmt::Debug for ThumbnailStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailStore")
            .field("db_path", &self.db_path)
            .field("db_id", &self.db_id)
            .finish()
    }
}
