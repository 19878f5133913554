//! SQLite-backed key-value store over the `kv_entries` table.

use super::{EntryVersion, KvEntry, KvError, KvResult, KvStore, KvWrite};
use crate::db::{open_db, open_db_in_memory};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;

const KV_TABLE: &str = "kv_entries";

/// Key-value store owning one migrated SQLite connection.
pub struct SqliteKvStore {
    conn: Connection,
}

impl SqliteKvStore {
    /// Wraps a migrated connection, rejecting one without `kv_entries`.
    pub fn try_new(conn: Connection) -> KvResult<Self> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [KV_TABLE],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(KvError::MissingRequiredTable(KV_TABLE));
        }
        Ok(Self { conn })
    }

    pub fn open(path: impl AsRef<Path>) -> KvResult<Self> {
        Self::try_new(open_db(path)?)
    }

    pub fn open_in_memory() -> KvResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Underlying connection, for inspection and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> KvResult<Option<KvEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT value, version FROM kv_entries WHERE key = ?1;",
                [key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            Some((value, version)) => Ok(Some(KvEntry {
                value,
                version: parse_version(key, version)?,
            })),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> KvResult<EntryVersion> {
        let version: i64 = self.conn.query_row(
            "INSERT INTO kv_entries (key, value, version)
             VALUES (?1, ?2, 1)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                version = kv_entries.version + 1,
                updated_at = (strftime('%s', 'now') * 1000)
             RETURNING version;",
            params![key, value],
            |row| row.get(0),
        )?;
        parse_version(key, version)
    }

    fn commit(&self, writes: &[KvWrite]) -> KvResult<Vec<EntryVersion>> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let mut versions = Vec::with_capacity(writes.len());

        for write in writes {
            let current = current_version(&tx, write.key.as_str())?;
            if current != write.expected_version {
                warn!(
                    "event=kv_commit module=kv status=conflict key={} expected={:?} actual={:?}",
                    write.key, write.expected_version, current
                );
                // Dropping `tx` rolls back writes already applied in this batch.
                return Err(KvError::Conflict {
                    key: write.key.clone(),
                    expected: write.expected_version,
                    actual: current,
                });
            }

            let next = current.map_or(1, |version| version + 1);
            let next_db = i64::try_from(next).map_err(|_| {
                KvError::InvalidData(format!("version overflow for key `{}`", write.key))
            })?;
            tx.execute(
                "INSERT INTO kv_entries (key, value, version)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    version = excluded.version,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![write.key.as_str(), write.value.as_str(), next_db],
            )?;
            versions.push(next);
        }

        tx.commit()?;
        Ok(versions)
    }
}

fn current_version(tx: &Transaction<'_>, key: &str) -> KvResult<Option<EntryVersion>> {
    let version = tx
        .query_row(
            "SELECT version FROM kv_entries WHERE key = ?1;",
            [key],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    version.map(|value| parse_version(key, value)).transpose()
}

fn parse_version(key: &str, value: i64) -> KvResult<EntryVersion> {
    EntryVersion::try_from(value)
        .ok()
        .filter(|version| *version > 0)
        .ok_or_else(|| KvError::InvalidData(format!("invalid version `{value}` for key `{key}`")))
}
