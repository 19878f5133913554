//! Persistent key-value store contract.
//!
//! # Responsibility
//! - Define the string-keyed blob storage consumed by the domain store.
//! - Provide versioned, all-or-nothing batch writes (`commit`).
//!
//! # Invariants
//! - Every stored entry has a version >= 1 that grows by one per write.
//! - `commit` applies either every write of the batch or none of them.
//! - A write whose `expected_version` differs from the current version is a
//!   `Conflict`; `None` expects the key to be absent.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite_kv;

pub use sqlite_kv::SqliteKvStore;

/// Monotonic per-key write counter.
pub type EntryVersion = u64;

pub type KvResult<T> = Result<T, KvError>;

/// Stored blob together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub value: String,
    pub version: EntryVersion,
}

/// One compare-and-swap write inside a `commit` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvWrite {
    pub key: String,
    pub value: String,
    pub expected_version: Option<EntryVersion>,
}

impl KvWrite {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        expected_version: Option<EntryVersion>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expected_version,
        }
    }
}

#[derive(Debug)]
pub enum KvError {
    Db(DbError),
    /// Key changed since it was read.
    Conflict {
        key: String,
        expected: Option<EntryVersion>,
        actual: Option<EntryVersion>,
    },
    /// Backing storage cannot serve the request.
    Unavailable(String),
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl KvError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl Display for KvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "write conflict on key `{key}`: expected version {}, found {}",
                version_label(*expected),
                version_label(*actual)
            ),
            Self::Unavailable(message) => write!(f, "key-value store unavailable: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "key-value store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid key-value entry: {message}"),
        }
    }
}

impl Error for KvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for KvError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for KvError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

fn version_label(version: Option<EntryVersion>) -> String {
    version.map_or_else(|| "absent".to_string(), |value| value.to_string())
}

/// String-keyed blob storage with versioned writes.
pub trait KvStore {
    /// Reads one entry. `Ok(None)` means the key was never written.
    fn get(&self, key: &str) -> KvResult<Option<KvEntry>>;
    /// Writes unconditionally and returns the new version.
    fn set(&self, key: &str, value: &str) -> KvResult<EntryVersion>;
    /// Applies all writes atomically, returning new versions in batch order.
    fn commit(&self, writes: &[KvWrite]) -> KvResult<Vec<EntryVersion>>;
}

impl<T: KvStore + ?Sized> KvStore for &T {
    fn get(&self, key: &str) -> KvResult<Option<KvEntry>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> KvResult<EntryVersion> {
        (**self).set(key, value)
    }

    fn commit(&self, writes: &[KvWrite]) -> KvResult<Vec<EntryVersion>> {
        (**self).commit(writes)
    }
}
