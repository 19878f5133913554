//! JSON collection repository.
//!
//! # Responsibility
//! - Read `groups`/`msgs` blobs together with the version they were read at.
//! - Stage versioned writes so callers can commit several keys at once.
//!
//! # Invariants
//! - Every staged write expects the version of the snapshot it derives from.
//! - Blob layout is a bare JSON array of entity records.

use crate::kv::{EntryVersion, KvError, KvStore, KvWrite};
use crate::model::group::Group;
use crate::model::message::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage key of the group collection.
pub const GROUPS_KEY: &str = "groups";
/// Storage key of the message collection.
pub const MESSAGES_KEY: &str = "msgs";

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Kv(KvError),
    /// Stored blob exists but is not a valid collection.
    Corrupt {
        key: &'static str,
        source: serde_json::Error,
    },
    Encode {
        key: &'static str,
        source: serde_json::Error,
    },
}

impl RepoError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Kv(err) if err.is_conflict())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kv(err) => write!(f, "{err}"),
            Self::Corrupt { key, source } => {
                write!(f, "stored collection `{key}` is corrupt: {source}")
            }
            Self::Encode { key, source } => {
                write!(f, "failed to encode collection `{key}`: {source}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kv(err) => Some(err),
            Self::Corrupt { source, .. } | Self::Encode { source, .. } => Some(source),
        }
    }
}

impl From<KvError> for RepoError {
    fn from(value: KvError) -> Self {
        Self::Kv(value)
    }
}

/// Whole collection as read from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    /// `None` when the key has never been written.
    pub version: Option<EntryVersion>,
}

/// Encodes `items` as the replacement blob for `key`, expecting the version
/// the items were derived from.
pub fn stage_collection<T: Serialize>(
    key: &'static str,
    items: &[T],
    expected_version: Option<EntryVersion>,
) -> RepoResult<KvWrite> {
    let value = serde_json::to_string(items).map_err(|source| RepoError::Encode { key, source })?;
    Ok(KvWrite::new(key, value, expected_version))
}

/// Typed access to the group and message collections.
pub struct CollectionRepository<S: KvStore> {
    store: S,
}

impl<S: KvStore> CollectionRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load_groups(&self) -> RepoResult<Snapshot<Group>> {
        self.load(GROUPS_KEY)
    }

    pub fn load_messages(&self) -> RepoResult<Snapshot<Message>> {
        self.load(MESSAGES_KEY)
    }

    /// Applies staged writes atomically.
    pub fn commit(&self, writes: &[KvWrite]) -> RepoResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.store.commit(writes)?;
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, key: &'static str) -> RepoResult<Snapshot<T>> {
        match self.store.get(key)? {
            Some(entry) => {
                let items = serde_json::from_str(&entry.value)
                    .map_err(|source| RepoError::Corrupt { key, source })?;
                Ok(Snapshot {
                    items,
                    version: Some(entry.version),
                })
            }
            None => Ok(Snapshot {
                items: Vec::new(),
                version: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{stage_collection, CollectionRepository, RepoError, GROUPS_KEY, MESSAGES_KEY};
    use crate::kv::{KvStore, SqliteKvStore};
    use crate::model::group::Group;

    #[test]
    fn absent_key_loads_as_empty_unversioned_snapshot() {
        let repo = CollectionRepository::new(SqliteKvStore::open_in_memory().unwrap());
        let snapshot = repo.load_groups().unwrap();
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.version, None);
    }

    #[test]
    fn corrupt_blob_is_reported_not_emptied() {
        let repo = CollectionRepository::new(SqliteKvStore::open_in_memory().unwrap());
        repo.store().set(MESSAGES_KEY, "{not json").unwrap();
        match repo.load_messages().unwrap_err() {
            RepoError::Corrupt { key, .. } => assert_eq!(key, MESSAGES_KEY),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn staged_write_round_trips_through_commit() {
        let repo = CollectionRepository::new(SqliteKvStore::open_in_memory().unwrap());
        let snapshot = repo.load_groups().unwrap();
        let write =
            stage_collection(GROUPS_KEY, &[Group::with_id("g1", "Work")], snapshot.version)
                .unwrap();
        repo.commit(&[write]).unwrap();

        let stored = repo.store().get(GROUPS_KEY).unwrap().unwrap();
        assert_eq!(stored.value, r#"[{"id":"g1","name":"Work"}]"#);
        assert_eq!(repo.load_groups().unwrap().version, Some(1));
    }

    #[test]
    fn staging_from_stale_snapshot_conflicts() {
        let repo = CollectionRepository::new(SqliteKvStore::open_in_memory().unwrap());
        let stale = repo.load_groups().unwrap();
        repo.store().set(GROUPS_KEY, "[]").unwrap();

        let write =
            stage_collection(GROUPS_KEY, &[Group::with_id("g1", "Work")], stale.version).unwrap();
        assert!(repo.commit(&[write]).unwrap_err().is_conflict());
    }
}
