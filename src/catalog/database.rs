//! SQLite-backed file catalog.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::entry::CatalogRecord;
use crate::scanner::{hash_to_hex, hex_to_hash, FileEntry, Hash};

/// Errors raised by the catalog. Any of these aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The underlying SQLite call failed.
    #[error("catalog database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The catalog file could not be prepared.
    #[error("catalog file error for {path}: {source}")]
    Io {
        /// Catalog file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A stored value could not be decoded.
    #[error("corrupt catalog row {id}: {message}")]
    Corrupt {
        /// Row id
        id: i64,
        /// What was wrong
        message: String,
    },

    /// A writer panicked while holding the connection.
    #[error("catalog lock poisoned")]
    Poisoned,
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id   INTEGER PRIMARY KEY,
    dir  BLOB    NOT NULL,
    name BLOB    NOT NULL,
    size INTEGER NOT NULL,
    hash TEXT,
    dup  INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_files_size ON files(size);
CREATE INDEX IF NOT EXISTS idx_files_size_hash ON files(size, hash);
";

const SELECT_COLUMNS: &str = "SELECT id, dir, name, size, hash, dup FROM files";

/// Persistent table of observed files.
///
/// The connection is guarded by a mutex, so fingerprint and duplicate-flag
/// writes may come from several worker threads.
pub struct Catalog {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").field("path", &self.path).finish()
    }
}

impl Catalog {
    /// Create a fresh on-disk catalog at `path`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the old file cannot be removed or the database
    /// cannot be opened.
    pub fn create(path: &Path) -> CatalogResult<Self> {
        for stale in [
            path.to_path_buf(),
            sidecar_path(path, "-wal"),
            sidecar_path(path, "-shm"),
        ] {
            match std::fs::remove_file(&stale) {
                Ok(()) => log::debug!("Removed previous catalog file {}", stale.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CatalogError::Io {
                        path: stale,
                        source: e,
                    })
                }
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        let catalog = Self::from_connection(conn, Some(path.to_path_buf()))?;
        log::info!("Catalog created at {}", path.display());
        Ok(catalog)
    }

    /// Open a throwaway catalog held entirely in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> CatalogResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> CatalogResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// On-disk location, or `None` for in-memory catalogs.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> CatalogResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CatalogError::Poisoned)
    }

    /// Record a file. Returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert(&self, dir: &Path, name: impl AsRef<OsStr>, size: u64) -> CatalogResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO files (dir, name, size) VALUES (?1, ?2, ?3)",
            params![
                path_to_blob(dir),
                path_to_blob(Path::new(name.as_ref())),
                size_to_sql(size)
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record a batch of scanned files in one transaction. Returns the row count.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; the whole batch is rolled back.
    pub fn insert_entries(&self, files: &[FileEntry]) -> CatalogResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare_cached("INSERT INTO files (dir, name, size) VALUES (?1, ?2, ?3)")?;
            for file in files {
                stmt.execute(params![
                    path_to_blob(file.dir()),
                    path_to_blob(Path::new(file.path.file_name().unwrap_or_default())),
                    size_to_sql(file.size),
                ])?;
            }
        }
        tx.commit()?;
        Ok(files.len())
    }

    /// Number of catalogued files.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn len(&self) -> CatalogResult<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Whether the catalog holds no files.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn is_empty(&self) -> CatalogResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Fetch one record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub fn get(&self, id: i64) -> CatalogResult<Option<CatalogRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(RawRow::into_record).transpose()
    }

    /// Sizes shared by more than one file, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn sizes_with_multiple_entries(&self) -> CatalogResult<Vec<u64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT size FROM files GROUP BY size HAVING COUNT(*) > 1 ORDER BY size",
        )?;
        let sizes = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sizes.into_iter().map(size_from_sql).collect())
    }

    /// All records of the given size, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn records_for_size(&self, size: u64) -> CatalogResult<Vec<CatalogRecord>> {
        self.query_records(
            &format!("{SELECT_COLUMNS} WHERE size = ?1 ORDER BY id"),
            params![size_to_sql(size)],
        )
    }

    /// Store the fingerprint of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_fingerprint(&self, id: i64, fingerprint: &Hash) -> CatalogResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE files SET hash = ?1 WHERE id = ?2",
            params![hash_to_hex(fingerprint), id],
        )?;
        Ok(())
    }

    /// Records whose `(size, fingerprint)` pair occurs more than once,
    /// ordered by fingerprint, then size, then insertion order.
    ///
    /// Records without a fingerprint never appear.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn groups_with_multiple_fingerprints(&self) -> CatalogResult<Vec<CatalogRecord>> {
        self.query_records(
            "SELECT f.id, f.dir, f.name, f.size, f.hash, f.dup FROM files f \
             JOIN (SELECT size, hash FROM files WHERE hash IS NOT NULL \
                   GROUP BY size, hash HAVING COUNT(*) > 1) g \
               ON f.size = g.size AND f.hash = g.hash \
             ORDER BY f.hash, f.size, f.id",
            [],
        )
    }

    /// Flag a record as a duplicate of its class's canonical file.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_duplicate(&self, id: i64) -> CatalogResult<()> {
        let conn = self.lock()?;
        conn.execute("UPDATE files SET dup = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// All records flagged as duplicates, ordered by fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn duplicates(&self) -> CatalogResult<Vec<CatalogRecord>> {
        self.query_records(
            &format!("{SELECT_COLUMNS} WHERE dup = 1 ORDER BY hash, id"),
            [],
        )
    }

    fn query_records<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> CatalogResult<Vec<CatalogRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let raw = stmt
            .query_map(params, RawRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawRow::into_record).collect()
    }
}

/// Undecoded row as it comes out of SQLite.
struct RawRow {
    id: i64,
    dir: Vec<u8>,
    name: Vec<u8>,
    size: i64,
    hash: Option<String>,
    dup: bool,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            dir: row.get(1)?,
            name: row.get(2)?,
            size: row.get(3)?,
            hash: row.get(4)?,
            dup: row.get::<_, i64>(5)? != 0,
        })
    }

    fn into_record(self) -> CatalogResult<CatalogRecord> {
        let fingerprint = match self.hash {
            Some(hex) => Some(hex_to_hash(&hex).ok_or_else(|| CatalogError::Corrupt {
                id: self.id,
                message: format!("invalid fingerprint '{hex}'"),
            })?),
            None => None,
        };
        Ok(CatalogRecord {
            id: self.id,
            dir: blob_to_path(self.dir),
            name: blob_to_path(self.name).into_os_string(),
            size: size_from_sql(self.size),
            fingerprint,
            is_duplicate: self.dup,
        })
    }
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

// SQLite integers are signed; file sizes never approach i64::MAX.
fn size_to_sql(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn size_from_sql(size: i64) -> u64 {
    u64::try_from(size).unwrap_or(0)
}

#[cfg(unix)]
fn path_to_blob(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn blob_to_path(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_to_blob(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
fn blob_to_path(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}
