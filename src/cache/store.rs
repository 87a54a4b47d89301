//! On-disk tier (tier 2) of the metadata/hash cache (spec.md 4.1, section
//! 6 "Persisted state layout").
//!
//! A `rusqlite` connection guarded by a single mutex, matching SQLite's own
//! single-writer model; callers degrade to tier-1-only on any error from
//! this module rather than propagating it as a hard failure, per spec.md's
//! "Failure modes" note.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{RenamerError, Result};
use crate::model::{FileFingerprint, HashAlgorithm, HashEntry, MetadataEntry, MetadataValue};

/// The on-disk cache store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if needed) the cache database at `path` and ensures
    /// its schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| RenamerError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(RenamerError::CacheStoreError)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests that don't want to touch disk.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(RenamerError::CacheStoreError)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS metadata (
                path TEXT PRIMARY KEY,
                is_extended INTEGER NOT NULL,
                payload BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS hashes (
                path TEXT PRIMARY KEY,
                algo TEXT NOT NULL,
                digest TEXT NOT NULL,
                size INTEGER NOT NULL,
                mtime INTEGER NOT NULL
            );",
        )
        .map_err(RenamerError::CacheStoreError)?;
        Ok(())
    }

    pub fn get_metadata(&self, path: &str) -> Result<Option<MetadataEntry>> {
        let conn = self.conn.lock();
        let row: Option<(i64, Vec<u8>)> = conn
            .query_row(
                "SELECT is_extended, payload FROM metadata WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(RenamerError::CacheStoreError)?;

        let Some((is_extended, payload)) = row else {
            return Ok(None);
        };
        let fields: std::collections::HashMap<String, MetadataValue> =
            serde_json::from_slice(&payload).map_err(|e| {
                RenamerError::CacheStoreError(rusqlite::Error::InvalidColumnType(
                    1,
                    format!("payload JSON: {e}"),
                    rusqlite::types::Type::Blob,
                ))
            })?;
        Ok(Some(MetadataEntry {
            fields,
            is_extended: is_extended != 0,
        }))
    }

    pub fn put_metadata(&self, path: &str, entry: &MetadataEntry) -> Result<()> {
        let payload = serde_json::to_vec(&entry.fields).expect("MetadataValue is serializable");
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO metadata (path, is_extended, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET is_extended = excluded.is_extended, payload = excluded.payload",
            params![path, entry.is_extended as i64, payload],
        )
        .map_err(RenamerError::CacheStoreError)?;
        Ok(())
    }

    pub fn get_hash(&self, path: &str) -> Result<Option<HashEntry>> {
        let conn = self.conn.lock();
        let row: Option<(String, String, i64, i64)> = conn
            .query_row(
                "SELECT algo, digest, size, mtime FROM hashes WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(RenamerError::CacheStoreError)?;

        let Some((algo, digest, size, mtime)) = row else {
            return Ok(None);
        };
        let Some(algorithm) = HashAlgorithm::parse(&algo) else {
            return Ok(None);
        };
        Ok(Some(HashEntry {
            digest,
            algorithm,
            fingerprint: FileFingerprint {
                size: size as u64,
                modified_time_nanos: mtime as u128,
            },
        }))
    }

    pub fn put_hash(&self, path: &str, entry: &HashEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO hashes (path, algo, digest, size, mtime) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET algo = excluded.algo, digest = excluded.digest, \
             size = excluded.size, mtime = excluded.mtime",
            params![
                path,
                entry.algorithm.as_str(),
                entry.digest,
                entry.fingerprint.size as i64,
                entry.fingerprint.modified_time_nanos as i64,
            ],
        )
        .map_err(RenamerError::CacheStoreError)?;
        Ok(())
    }

    pub fn invalidate(&self, path: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM metadata WHERE path = ?1", params![path])
            .map_err(RenamerError::CacheStoreError)?;
        conn.execute("DELETE FROM hashes WHERE path = ?1", params![path])
            .map_err(RenamerError::CacheStoreError)?;
        Ok(())
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
        let pattern = format!("{prefix}%");
        let conn = self.conn.lock();
        conn.execute("DELETE FROM metadata WHERE path LIKE ?1", params![pattern])
            .map_err(RenamerError::CacheStoreError)?;
        conn.execute("DELETE FROM hashes WHERE path LIKE ?1", params![pattern])
            .map_err(RenamerError::CacheStoreError)?;
        Ok(())
    }

    pub fn rekey(&self, old_path: &str, new_path: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE metadata SET path = ?2 WHERE path = ?1",
            params![old_path, new_path],
        )
        .map_err(RenamerError::CacheStoreError)?;
        conn.execute(
            "UPDATE hashes SET path = ?2 WHERE path = ?1",
            params![old_path, new_path],
        )
        .map_err(RenamerError::CacheStoreError)?;
        Ok(())
    }
}
