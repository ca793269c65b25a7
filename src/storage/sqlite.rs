//! SQLite persistence for subtrees and leaves.
//!
//! Uses connection pooling via r2d2. Completing a subtree is a single
//! transactional hop: the insert into `complete_subtrees` fires a trigger
//! that deletes the matching pending row.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use thiserror::Error;

use crate::leaf::Leaf;
use crate::name::Name;

/// Storage errors. These are fatal to the logger; logic rejections on the
/// append path are reported as `Ok(false)` instead.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("connection error: {0}")]
    Connection(String),
}

const DB_FILE_NAME: &str = "sig-logger.db";

const INITIALIZATION: &str = r#"
CREATE TABLE IF NOT EXISTS complete_subtrees (
    id       INTEGER PRIMARY KEY,
    level    INTEGER NOT NULL,
    seq_no   INTEGER NOT NULL,
    record   BLOB NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS complete_subtrees_index
    ON complete_subtrees(level, seq_no);
CREATE TRIGGER IF NOT EXISTS complete_subtrees_after_insert
    AFTER INSERT ON complete_subtrees
    FOR EACH ROW
    BEGIN
        DELETE FROM pending_subtrees
        WHERE level = NEW.level AND seq_no = NEW.seq_no;
    END;

CREATE TABLE IF NOT EXISTS pending_subtrees (
    id               INTEGER PRIMARY KEY,
    level            INTEGER NOT NULL,
    seq_no           INTEGER NOT NULL,
    next_leaf_seq_no INTEGER NOT NULL,
    record           BLOB NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS pending_subtrees_index
    ON pending_subtrees(level, seq_no);

CREATE TABLE IF NOT EXISTS leaves (
    id            INTEGER PRIMARY KEY,
    data_seq_no   INTEGER NOT NULL,
    data_name     BLOB NOT NULL,
    signer_seq_no INTEGER NOT NULL,
    timestamp     INTEGER NOT NULL,
    is_cert       INTEGER DEFAULT 0,
    cert          BLOB
);
CREATE UNIQUE INDEX IF NOT EXISTS leaves_index ON leaves(data_seq_no);
"#;

/// Handle to the logger's store. Cloning shares the pool and the leaf
/// counter.
#[derive(Clone)]
pub struct Db {
    pool: Pool<SqliteConnectionManager>,
    next_leaf_seq_no: Arc<AtomicU64>,
}

impl Db {
    /// Opens (creating if needed) the store under `dir` and recovers the
    /// next leaf sequence number from the leaf table.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir.as_ref())
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let manager = SqliteConnectionManager::file(dir.as_ref().join(DB_FILE_NAME));
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Self::initialize(pool)
    }

    /// In-memory store for testing.
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Self::initialize(pool)
    }

    fn initialize(pool: Pool<SqliteConnectionManager>) -> Result<Self, StorageError> {
        let db = Self {
            pool,
            next_leaf_seq_no: Arc::new(AtomicU64::new(0)),
        };
        db.run_migrations()?;
        let count = db.count_leaves()?;
        db.next_leaf_seq_no.store(count, Ordering::SeqCst);
        Ok(db)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        self.conn()?
            .execute_batch(INITIALIZATION)
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn count_leaves(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT count(data_seq_no) FROM leaves", [], |row| row.get(0))
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(count as u64)
    }

    /// The sequence number the next accepted leaf must carry.
    pub fn next_leaf_seq_no(&self) -> u64 {
        self.next_leaf_seq_no.load(Ordering::SeqCst)
    }

    /// Stores a subtree record. Complete subtrees are insert-only
    /// (a duplicate returns `Ok(false)`); pending subtrees are upserted.
    pub fn insert_sub_tree_data(
        &self,
        level: u64,
        seq_no: u64,
        record: &[u8],
        is_full: bool,
        next_leaf_seq_no: u64,
    ) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let result = if is_full {
            conn.execute(
                "INSERT INTO complete_subtrees (level, seq_no, record) VALUES (?1, ?2, ?3)",
                params![level as i64, seq_no as i64, record],
            )
        } else {
            conn.execute(
                "INSERT OR REPLACE INTO pending_subtrees (level, seq_no, record, next_leaf_seq_no) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![level as i64, seq_no as i64, record, next_leaf_seq_no as i64],
            )
        };

        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(ref err, _))
                if err.extended_code == 1555 || err.extended_code == 2067 =>
            {
                Ok(false)
            }
            Err(e) => Err(StorageError::Database(e.to_string())),
        }
    }

    /// Fetches a subtree record: the complete table first, pending second.
    pub fn get_sub_tree_data(
        &self,
        level: u64,
        seq_no: u64,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let conn = self.conn()?;

        let complete: Option<Vec<u8>> = conn
            .query_row(
                "SELECT record FROM complete_subtrees WHERE level = ?1 AND seq_no = ?2",
                params![level as i64, seq_no as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        if complete.is_some() {
            return Ok(complete);
        }

        conn.query_row(
            "SELECT record FROM pending_subtrees WHERE level = ?1 AND seq_no = ?2",
            params![level as i64, seq_no as i64],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// All pending subtree records, root-most (highest level) first.
    pub fn get_pending_sub_trees(&self) -> Result<Vec<Vec<u8>>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT record FROM pending_subtrees ORDER BY level DESC")
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<Vec<Vec<u8>>, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(rows)
    }

    /// Appends a leaf row, optionally with the certificate payload it
    /// carries. Returns `Ok(false)` when `leaf` does not hold the next
    /// sequence number.
    pub fn insert_leaf_data(&self, leaf: &Leaf, cert: Option<&[u8]>) -> Result<bool, StorageError> {
        if leaf.data_seq_no() != self.next_leaf_seq_no() {
            return Ok(false);
        }

        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO leaves (data_seq_no, data_name, signer_seq_no, timestamp, is_cert, cert) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                leaf.data_seq_no() as i64,
                leaf.data_name().to_wire(),
                leaf.signer_seq_no() as i64,
                leaf.timestamp() as i64,
                cert.is_some() as i64,
                cert,
            ],
        );

        match result {
            Ok(_) => {
                self.next_leaf_seq_no.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            Err(rusqlite::Error::SqliteFailure(ref err, _))
                if err.extended_code == 1555 || err.extended_code == 2067 =>
            {
                Ok(false)
            }
            Err(e) => Err(StorageError::Database(e.to_string())),
        }
    }

    /// Fetches a leaf and, when it logged a certificate, the stored payload.
    pub fn get_leaf(&self, seq_no: u64) -> Result<Option<(Leaf, Option<Vec<u8>>)>, StorageError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT data_name, signer_seq_no, timestamp, cert \
                 FROM leaves WHERE data_seq_no = ?1",
                params![seq_no as i64],
                |row| {
                    let name: Vec<u8> = row.get(0)?;
                    let signer_seq_no: i64 = row.get(1)?;
                    let timestamp: i64 = row.get(2)?;
                    let cert: Option<Vec<u8>> = row.get(3)?;
                    Ok((name, signer_seq_no, timestamp, cert))
                },
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let Some((name_wire, signer_seq_no, timestamp, cert)) = row else {
            return Ok(None);
        };

        let data_name = Name::decode(&name_wire)
            .map_err(|e| StorageError::Database(format!("corrupt leaf name: {e}")))?;
        let leaf = Leaf::new(data_name, timestamp as u64, seq_no, signer_seq_no as u64)
            .map_err(|e| StorageError::Database(format!("corrupt leaf row: {e}")))?;

        Ok(Some((leaf, cert)))
    }
}
