//! SQLite storage for versioned artifact records and merged outputs
//!
//! Schema:
//! - artifacts: (order_number, line_number, sequence_number) -> source/derived paths, status
//! - merged_artifacts: (order_number, sequence_number) -> output path, included lines
//! - store_state: key/value metadata about the store itself
//!
//! Sequence numbers are allocated and consumed inside one `BEGIN IMMEDIATE`
//! transaction, so concurrent writers serialize on the database write lock
//! and always see each other's inserts. The UNIQUE constraints stay as the
//! backstop: a violation surfaces as [`Error::Conflict`] and allocation is
//! retried once.
//!
//! A file-backed `DB` owns two connections, each behind its own mutex: one
//! for writes and one for reads. The database runs in WAL mode, so a read
//! never waits for a writer, including a writer on this handle that is queued
//! behind another process's write lock.

use crate::error::{Error, Result};
use crate::model::{
    ArtifactRecord, ArtifactStatus, MergedArtifactRecord, MergedStatus, NewArtifact,
    NewMergedArtifact, StoreStats, VersionPolicy,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY,
    order_number INTEGER NOT NULL,
    line_number INTEGER NOT NULL,
    sequence_number INTEGER NOT NULL,
    original_name TEXT NOT NULL,
    source_path TEXT NOT NULL,
    derived_path TEXT,
    status TEXT NOT NULL DEFAULT 'uploaded',
    size_bytes INTEGER NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    converted_at INTEGER,
    UNIQUE(order_number, line_number, sequence_number)
);

CREATE TABLE IF NOT EXISTS merged_artifacts (
    id INTEGER PRIMARY KEY,
    order_number INTEGER NOT NULL,
    sequence_number INTEGER NOT NULL,
    output_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    line_numbers TEXT NOT NULL,
    file_count INTEGER NOT NULL,
    page_count INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'completed',
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(order_number, sequence_number)
);

CREATE TABLE IF NOT EXISTS store_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_artifacts_order_line ON artifacts(order_number, line_number, sequence_number);
CREATE INDEX IF NOT EXISTS idx_artifacts_created ON artifacts(created_at);
CREATE INDEX IF NOT EXISTS idx_merged_order ON merged_artifacts(order_number, sequence_number);
";

const ARTIFACT_COLUMNS: &str = "id, order_number, line_number, sequence_number, original_name, \
     source_path, derived_path, status, size_bytes, created_at, converted_at";

const MERGED_COLUMNS: &str = "id, order_number, sequence_number, output_path, size_bytes, \
     line_numbers, file_count, page_count, status, created_at";

/// How long a connection waits on another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Database connection wrapper
pub struct DB {
    writer: Mutex<Connection>,
    /// `None` for in-memory databases, which cannot be shared across connections
    reader: Option<Mutex<Connection>>,
}

impl DB {
    /// Open or create database at path
    pub fn new(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL keeps readers on other connections unblocked by writers
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute_batch(SCHEMA)?;

        // Run migrations for existing databases
        run_migrations(&conn)?;

        let reader = Connection::open(path)?;
        reader.busy_timeout(BUSY_TIMEOUT)?;
        reader.execute_batch("PRAGMA query_only = ON;")?;

        tracing::debug!("Opened record store at {}", path.display());
        Ok(Self {
            writer: Mutex::new(conn),
            reader: Some(Mutex::new(reader)),
        })
    }

    /// Open in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            writer: Mutex::new(conn),
            reader: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave an open transaction
        // behind (rusqlite rolls back on drop), so the connection is still usable.
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connection for queries; never the one writes queue on when file-backed
    fn read(&self) -> MutexGuard<'_, Connection> {
        match &self.reader {
            Some(reader) => reader.lock().unwrap_or_else(PoisonError::into_inner),
            None => self.lock(),
        }
    }

    // --- Artifact versions ---

    /// Sequence the next version of `(order, line)` would receive
    ///
    /// Informational only: [`DB::insert_next_artifact`] recomputes it inside
    /// its own transaction.
    pub fn next_sequence(&self, order_number: u32, line_number: u32) -> Result<u32> {
        next_artifact_sequence(&self.read(), order_number, line_number)
    }

    /// Insert a version with an explicit sequence number
    ///
    /// Fails with [`Error::Conflict`] if the sequence already exists for the key.
    pub fn insert_artifact(&self, new: &NewArtifact, sequence: u32) -> Result<i64> {
        insert_artifact_row(&self.lock(), new, sequence)
    }

    /// Allocate the next sequence for the key and insert the version atomically
    pub fn insert_next_artifact(
        &self,
        new: &NewArtifact,
        policy: VersionPolicy,
    ) -> Result<ArtifactRecord> {
        let mut conn = self.lock();
        let mut retried = false;
        loop {
            match allocate_and_insert_artifact(&mut conn, new, policy) {
                Err(Error::Conflict { key, sequence }) if !retried => {
                    tracing::warn!(
                        "Sequence {} for {} was taken concurrently, retrying allocation",
                        sequence,
                        key
                    );
                    retried = true;
                }
                other => return other,
            }
        }
    }

    /// Record a successful conversion
    pub fn mark_converted(&self, id: i64, derived_path: &str) -> Result<()> {
        self.finish_conversion(id, ArtifactStatus::Converted, Some(derived_path))
    }

    /// Record a failed conversion
    pub fn mark_error(&self, id: i64) -> Result<()> {
        self.finish_conversion(id, ArtifactStatus::Error, None)
    }

    fn finish_conversion(
        &self,
        id: i64,
        status: ArtifactStatus,
        derived_path: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock();
        let rows = conn.execute(
            "UPDATE artifacts
             SET status = ?1, derived_path = ?2, converted_at = CAST(strftime('%s', 'now') AS INTEGER)
             WHERE id = ?3 AND status = 'uploaded'",
            params![status.as_str(), derived_path, id],
        )?;
        if rows == 1 {
            return Ok(());
        }

        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM artifacts WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            None => Err(Error::NotFound(format!("artifact record {id}"))),
            Some(status) => Err(Error::InvalidTransition { id, status }),
        }
    }

    /// Get an artifact record by ID
    pub fn get_artifact(&self, id: i64) -> Result<Option<ArtifactRecord>> {
        get_artifact_by_id(&self.read(), id)
    }

    /// Latest version (maximum sequence) for the key
    pub fn get_latest(&self, order_number: u32, line_number: u32) -> Result<Option<ArtifactRecord>> {
        let sql = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts
             WHERE order_number = ? AND line_number = ?
             ORDER BY sequence_number DESC LIMIT 1"
        );
        Ok(self
            .read()
            .query_row(&sql, params![order_number, line_number], artifact_from_row)
            .optional()?)
    }

    pub fn get_version(
        &self,
        order_number: u32,
        line_number: u32,
        sequence_number: u32,
    ) -> Result<Option<ArtifactRecord>> {
        let sql = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts
             WHERE order_number = ? AND line_number = ? AND sequence_number = ?"
        );
        Ok(self
            .read()
            .query_row(
                &sql,
                params![order_number, line_number, sequence_number],
                artifact_from_row,
            )
            .optional()?)
    }

    /// Every version of the key, ascending by sequence
    pub fn get_all_versions(&self, order_number: u32, line_number: u32) -> Result<Vec<ArtifactRecord>> {
        let sql = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts
             WHERE order_number = ? AND line_number = ?
             ORDER BY sequence_number ASC"
        );
        let conn = self.read();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![order_number, line_number], artifact_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Latest version of every line of the order, ascending by line
    pub fn get_by_order(&self, order_number: u32) -> Result<Vec<ArtifactRecord>> {
        let sql = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts a
             WHERE a.order_number = ?1
               AND a.sequence_number = (
                   SELECT MAX(b.sequence_number) FROM artifacts b
                   WHERE b.order_number = a.order_number AND b.line_number = a.line_number
               )
             ORDER BY a.line_number ASC"
        );
        let conn = self.read();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![order_number], artifact_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All versions across orders, newest first
    pub fn list_artifacts(&self, limit: usize, offset: usize) -> Result<Vec<ArtifactRecord>> {
        let sql = format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        );
        let conn = self.read();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![sql_bound(limit, "limit")?, sql_bound(offset, "offset")?],
            artifact_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let stats = self.read().query_row(
            "SELECT
                COUNT(*),
                COUNT(CASE WHEN status = 'converted' THEN 1 END),
                COUNT(CASE WHEN status = 'uploaded' THEN 1 END),
                COUNT(CASE WHEN status = 'error' THEN 1 END),
                COALESCE(SUM(size_bytes), 0)
             FROM artifacts",
            [],
            |row| {
                Ok(StoreStats {
                    total: row.get::<_, i64>(0)? as u64,
                    converted: row.get::<_, i64>(1)? as u64,
                    pending: row.get::<_, i64>(2)? as u64,
                    error: row.get::<_, i64>(3)? as u64,
                    total_size: row.get::<_, i64>(4)? as u64,
                })
            },
        )?;
        Ok(stats)
    }

    // --- Merged outputs ---

    pub fn next_merged_sequence(&self, order_number: u32) -> Result<u32> {
        next_merged_sequence(&self.read(), order_number)
    }

    /// Allocate the next merged sequence for the order and insert the record atomically
    pub fn insert_next_merged(&self, new: &NewMergedArtifact) -> Result<MergedArtifactRecord> {
        if new.included_lines.is_empty() {
            return Err(Error::Validation(
                "a merged artifact must include at least one line".to_string(),
            ));
        }
        let mut conn = self.lock();
        let mut retried = false;
        loop {
            match allocate_and_insert_merged(&mut conn, new) {
                Err(Error::Conflict { key, sequence }) if !retried => {
                    tracing::warn!(
                        "Merged sequence {} for {} was taken concurrently, retrying allocation",
                        sequence,
                        key
                    );
                    retried = true;
                }
                other => return other,
            }
        }
    }

    /// A merged record by sequence, or the latest one when `sequence` is `None`
    pub fn get_merged(
        &self,
        order_number: u32,
        sequence_number: Option<u32>,
    ) -> Result<Option<MergedArtifactRecord>> {
        let conn = self.read();
        let record = match sequence_number {
            Some(sequence) => {
                let sql = format!(
                    "SELECT {MERGED_COLUMNS} FROM merged_artifacts
                     WHERE order_number = ? AND sequence_number = ?"
                );
                conn.query_row(&sql, params![order_number, sequence], merged_from_row)
                    .optional()?
            }
            None => {
                let sql = format!(
                    "SELECT {MERGED_COLUMNS} FROM merged_artifacts
                     WHERE order_number = ?
                     ORDER BY sequence_number DESC LIMIT 1"
                );
                conn.query_row(&sql, params![order_number], merged_from_row)
                    .optional()?
            }
        };
        Ok(record)
    }

    /// Every merged record for the order, ascending by sequence
    pub fn get_all_merged(&self, order_number: u32) -> Result<Vec<MergedArtifactRecord>> {
        let sql = format!(
            "SELECT {MERGED_COLUMNS} FROM merged_artifacts
             WHERE order_number = ?
             ORDER BY sequence_number ASC"
        );
        let conn = self.read();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![order_number], merged_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Merged records across orders, newest first
    pub fn list_merged(&self, limit: usize, offset: usize) -> Result<Vec<MergedArtifactRecord>> {
        let sql = format!(
            "SELECT {MERGED_COLUMNS} FROM merged_artifacts
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        );
        let conn = self.read();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![sql_bound(limit, "limit")?, sql_bound(offset, "offset")?],
            merged_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // --- Store state ---

    pub fn set_state(&self, key: &str, value: &str) -> Result<()> {
        self.lock().execute(
            "INSERT OR REPLACE INTO store_state (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_state(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .read()
            .query_row(
                "SELECT value FROM store_state WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }
}

/// LIMIT/OFFSET value; SQLite reads a negative OFFSET as zero, so never wrap
fn sql_bound(value: usize, name: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::Validation(format!("{name} {value} is out of range")))
}

fn artifact_key(order_number: u32, line_number: u32) -> String {
    format!("order {order_number} line {line_number}")
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn next_artifact_sequence(conn: &Connection, order_number: u32, line_number: u32) -> Result<u32> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sequence_number), 0) + 1 FROM artifacts
         WHERE order_number = ? AND line_number = ?",
        params![order_number, line_number],
        |row| row.get(0),
    )?;
    Ok(next as u32)
}

fn next_merged_sequence(conn: &Connection, order_number: u32) -> Result<u32> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sequence_number), 0) + 1 FROM merged_artifacts
         WHERE order_number = ?",
        params![order_number],
        |row| row.get(0),
    )?;
    Ok(next as u32)
}

fn insert_artifact_row(conn: &Connection, new: &NewArtifact, sequence: u32) -> Result<i64> {
    let result = conn.execute(
        "INSERT INTO artifacts (order_number, line_number, sequence_number, original_name, source_path, size_bytes)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            new.order_number,
            new.line_number,
            sequence,
            new.original_name,
            new.source_path,
            new.size_bytes as i64
        ],
    );
    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_constraint_violation(&e) => Err(Error::Conflict {
            key: artifact_key(new.order_number, new.line_number),
            sequence,
        }),
        Err(e) => Err(e.into()),
    }
}

fn allocate_and_insert_artifact(
    conn: &mut Connection,
    new: &NewArtifact,
    policy: VersionPolicy,
) -> Result<ArtifactRecord> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let sequence = next_artifact_sequence(&tx, new.order_number, new.line_number)?;
    if sequence > 1 && policy == VersionPolicy::FirstVersionOnly {
        // Dropping the transaction rolls it back
        return Err(Error::DuplicateVersion {
            order: new.order_number,
            line: new.line_number,
            existing: sequence - 1,
        });
    }

    let id = insert_artifact_row(&tx, new, sequence)?;
    let record = get_artifact_by_id(&tx, id)?
        .ok_or_else(|| Error::NotFound(format!("artifact record {id}")))?;
    tx.commit()?;

    tracing::debug!(
        "Allocated version {} for {}",
        sequence,
        artifact_key(new.order_number, new.line_number)
    );
    Ok(record)
}

fn allocate_and_insert_merged(
    conn: &mut Connection,
    new: &NewMergedArtifact,
) -> Result<MergedArtifactRecord> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let sequence = next_merged_sequence(&tx, new.order_number)?;
    let lines_json = serde_json::to_string(&new.included_lines)
        .map_err(|e| Error::Document(format!("failed to encode line list: {e}")))?;

    let result = tx.execute(
        "INSERT INTO merged_artifacts (order_number, sequence_number, output_path, size_bytes, line_numbers, file_count, page_count)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            new.order_number,
            sequence,
            new.output_path,
            new.size_bytes as i64,
            lines_json,
            new.included_lines.len() as i64,
            new.page_count
        ],
    );
    match result {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(Error::Conflict {
                key: format!("merged order {}", new.order_number),
                sequence,
            })
        }
        Err(e) => return Err(e.into()),
    }

    let id = tx.last_insert_rowid();
    let sql = format!("SELECT {MERGED_COLUMNS} FROM merged_artifacts WHERE id = ?");
    let record = tx.query_row(&sql, params![id], merged_from_row)?;
    tx.commit()?;
    Ok(record)
}

fn get_artifact_by_id(conn: &Connection, id: i64) -> Result<Option<ArtifactRecord>> {
    let sql = format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?");
    Ok(conn
        .query_row(&sql, params![id], artifact_from_row)
        .optional()?)
}

fn conversion_failure(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<ArtifactRecord> {
    let status: String = row.get(7)?;
    Ok(ArtifactRecord {
        id: row.get(0)?,
        order_number: row.get::<_, i64>(1)? as u32,
        line_number: row.get::<_, i64>(2)? as u32,
        sequence_number: row.get::<_, i64>(3)? as u32,
        original_name: row.get(4)?,
        source_path: row.get(5)?,
        derived_path: row.get(6)?,
        status: status.parse().map_err(|e: String| conversion_failure(7, e))?,
        size_bytes: row.get::<_, i64>(8)? as u64,
        created_at: row.get(9)?,
        converted_at: row.get(10)?,
    })
}

fn merged_from_row(row: &Row<'_>) -> rusqlite::Result<MergedArtifactRecord> {
    let lines_json: String = row.get(5)?;
    let included_lines: Vec<u32> =
        serde_json::from_str(&lines_json).map_err(|e| conversion_failure(5, e))?;
    let status: String = row.get(8)?;
    Ok(MergedArtifactRecord {
        id: row.get(0)?,
        order_number: row.get::<_, i64>(1)? as u32,
        sequence_number: row.get::<_, i64>(2)? as u32,
        output_path: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)? as u64,
        included_lines,
        file_count: row.get::<_, i64>(6)? as u32,
        page_count: row.get::<_, i64>(7)? as u32,
        status: status.parse().map_err(|e: String| conversion_failure(8, e))?,
        created_at: row.get(9)?,
    })
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Blob key for a path the single-table service stored
///
/// That service kept absolute or `./`-relative paths straight inside its
/// upload and converted folders. Blobs now live under `uploads/` and
/// `converted/` of the blob root, so only the file name carries over.
fn legacy_blob_key(folder: &str, legacy_path: &str) -> String {
    match Path::new(legacy_path).file_name().and_then(|name| name.to_str()) {
        Some(name) => format!("{folder}/{name}"),
        None => legacy_path.to_string(),
    }
}

/// One row of the legacy `files` table, paths already rewritten to blob keys
struct LegacyRow {
    order_number: i64,
    line_number: i64,
    sequence_number: i64,
    original_name: String,
    source_path: String,
    derived_path: Option<String>,
    status: String,
    size_bytes: i64,
    created_at: i64,
    converted_at: Option<i64>,
}

/// Run database migrations for schema changes
///
/// Databases written by the earlier single-table service keep their rows in
/// `files`. Those rows are copied into `artifacts` once and the old table is
/// renamed to `files_legacy`.
fn run_migrations(conn: &Connection) -> Result<()> {
    // Migration 1: import legacy `files` rows
    if table_exists(conn, "files")? {
        let sequence_expr = if column_exists(conn, "files", "sequence_number")? {
            "COALESCE(sequence_number, 1)"
        } else {
            "1"
        };
        let select = format!(
            "SELECT order_number, line_number, {sequence_expr}, original_filename, svg_path,
                    pdf_path, COALESCE(status, 'uploaded'), COALESCE(file_size, 0),
                    COALESCE(CAST(strftime('%s', created_at) AS INTEGER),
                             CAST(strftime('%s', 'now') AS INTEGER)),
                    CAST(strftime('%s', converted_at) AS INTEGER)
             FROM files ORDER BY id"
        );

        let tx = conn.unchecked_transaction()?;
        let rows = {
            let mut stmt = tx.prepare(&select)?;
            let rows = stmt.query_map([], |row| {
                let svg_path: String = row.get(4)?;
                let pdf_path: Option<String> = row.get(5)?;
                Ok(LegacyRow {
                    order_number: row.get(0)?,
                    line_number: row.get(1)?,
                    sequence_number: row.get(2)?,
                    original_name: row.get(3)?,
                    source_path: legacy_blob_key("uploads", &svg_path),
                    derived_path: pdf_path.map(|p| legacy_blob_key("converted", &p)),
                    status: row.get(6)?,
                    size_bytes: row.get(7)?,
                    created_at: row.get(8)?,
                    converted_at: row.get(9)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut imported = 0;
        for row in &rows {
            imported += tx.execute(
                "INSERT OR IGNORE INTO artifacts
                    (order_number, line_number, sequence_number, original_name, source_path,
                     derived_path, status, size_bytes, created_at, converted_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    row.order_number,
                    row.line_number,
                    row.sequence_number,
                    row.original_name,
                    row.source_path,
                    row.derived_path,
                    row.status,
                    row.size_bytes,
                    row.created_at,
                    row.converted_at
                ],
            )?;
        }
        tx.execute("ALTER TABLE files RENAME TO files_legacy", [])?;
        tx.commit()?;

        tracing::info!("Imported {} legacy file record(s) into artifacts", imported);
    }

    Ok(())
}
