use std::path::Path;

use log::info;
use rusqlite::{params, Connection};

use crate::config::ScopeMode;
use crate::error::Result;
use crate::index::models::{ImageRecord, NewRecord};

const LAST_DIRECTORY_KEY: &str = "last_directory";

/// Durable path-to-fingerprint store.
///
/// Single-writer: all mutations go through `&mut self`, readers borrow
/// shared. Every write is transactional at single-record or whole-table
/// granularity; partial records are never observable.
pub struct HashIndex {
    conn: Connection,
}

impl HashIndex {
    /// Open (creating if missing) the index database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let index = Self::init(conn)?;
        info!("Hash index opened at {}", path.display());
        Ok(index)
    }

    /// Open an in-memory index (used by tests)
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS image_hashes (
                path TEXT PRIMARY KEY NOT NULL,
                fingerprint TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                modified_time INTEGER NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_fingerprint ON image_hashes(fingerprint);
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Insert or replace the record for a path. Idempotent; the whole record
    /// is replaced, never patched.
    pub fn upsert(&mut self, record: &NewRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO image_hashes
                (path, fingerprint, file_size, modified_time, width, height, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                (SELECT IFNULL(MAX(created_at), 0) + 1 FROM image_hashes))
             ON CONFLICT(path) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                file_size = excluded.file_size,
                modified_time = excluded.modified_time,
                width = excluded.width,
                height = excluded.height,
                created_at = excluded.created_at",
            params![
                record.path,
                record.fingerprint,
                record.file_size as i64,
                record.modified_time,
                record.width,
                record.height,
            ],
        )?;
        Ok(())
    }

    /// Upsert a batch of records inside one transaction
    pub fn upsert_batch(&mut self, records: &[NewRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for record in records {
            tx.execute(
                "INSERT INTO image_hashes
                    (path, fingerprint, file_size, modified_time, width, height, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                    (SELECT IFNULL(MAX(created_at), 0) + 1 FROM image_hashes))
                 ON CONFLICT(path) DO UPDATE SET
                    fingerprint = excluded.fingerprint,
                    file_size = excluded.file_size,
                    modified_time = excluded.modified_time,
                    width = excluded.width,
                    height = excluded.height,
                    created_at = excluded.created_at",
                params![
                    record.path,
                    record.fingerprint,
                    record.file_size as i64,
                    record.modified_time,
                    record.width,
                    record.height,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Fetch a single record by path
    pub fn get(&self, path: &str) -> Result<Option<ImageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, fingerprint, file_size, modified_time, width, height, created_at
             FROM image_hashes WHERE path = ?1",
        )?;
        let mut rows = stmt.query_map(params![path], row_to_record)?;
        match rows.next() {
            Some(record) => Ok(Some(record?)),
            None => Ok(None),
        }
    }

    /// All records whose path starts with the given prefix, in insertion
    /// order.
    ///
    /// This is a plain string-prefix test: `/a/b` also matches `/a/bc/x.jpg`
    /// and trailing separators matter. Use [`HashIndex::scan_scoped`] with
    /// `ScopeMode::Segment` for separator-aware scoping.
    pub fn scan(&self, prefix: &str) -> Result<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, fingerprint, file_size, modified_time, width, height, created_at
             FROM image_hashes
             WHERE substr(path, 1, ?2) = ?1
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(
            params![prefix, prefix.chars().count() as i64],
            row_to_record,
        )?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Prefix scan honoring the configured scoping rule
    pub fn scan_scoped(&self, prefix: &str, mode: ScopeMode) -> Result<Vec<ImageRecord>> {
        let mut records = self.scan(prefix)?;
        if mode == ScopeMode::Segment {
            records.retain(|r| on_segment_boundary(prefix, &r.path));
        }
        Ok(records)
    }

    /// Delete every record whose path fails the injected existence probe.
    ///
    /// The probe keeps this store filesystem-agnostic; callers decide what
    /// "exists" means. Returns the number of removed records.
    pub fn remove_missing<F>(&mut self, exists: F) -> Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        let paths: Vec<String> = {
            let mut stmt = self.conn.prepare("SELECT path FROM image_hashes")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut paths = Vec::new();
            for row in rows {
                paths.push(row?);
            }
            paths
        };

        let stale: Vec<String> = paths.into_iter().filter(|p| !exists(p)).collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        for path in &stale {
            tx.execute("DELETE FROM image_hashes WHERE path = ?1", params![path])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    /// Remove a single record; returns true if a record existed
    pub fn remove(&mut self, path: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM image_hashes WHERE path = ?1", params![path])?;
        Ok(changed > 0)
    }

    /// Total number of indexed records
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM image_hashes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Wipe all records. Settings survive.
    pub fn clear(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM image_hashes", [])?;
        Ok(())
    }

    /// Record the directory most recently handed to an index run
    pub fn set_last_directory(&mut self, directory: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_DIRECTORY_KEY, directory],
        )?;
        Ok(())
    }

    /// Directory most recently handed to an index run, if any
    pub fn last_directory(&self) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![LAST_DIRECTORY_KEY], |row| {
            row.get::<_, String>(0)
        })?;
        match rows.next() {
            Some(value) => Ok(Some(value?)),
            None => Ok(None),
        }
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        path: row.get(0)?,
        fingerprint: row.get(1)?,
        file_size: row.get::<_, i64>(2)?.max(0) as u64,
        modified_time: row.get(3)?,
        width: row.get(4)?,
        height: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// True when `path` extends `prefix` at a path-segment boundary
fn on_segment_boundary(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() || prefix.ends_with('/') || prefix.ends_with('\\') {
        return true;
    }
    match path[prefix.len()..].chars().next() {
        None => true,
        Some(c) => c == '/' || c == '\\',
    }
}
