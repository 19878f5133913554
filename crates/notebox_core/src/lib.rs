//! Core domain logic for NoteBox.
//! This crate is the single source of truth for group/message invariants.

pub mod config;
pub mod db;
pub mod kv;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig, DB_PATH_ENV};
pub use kv::{EntryVersion, KvEntry, KvError, KvResult, KvStore, KvWrite, SqliteKvStore};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::group::{Group, GroupId};
pub use model::message::{now_timestamp, Message, MessageId};
pub use model::validation::ValidationError;
pub use repo::collection_repo::{
    CollectionRepository, RepoError, RepoResult, Snapshot, GROUPS_KEY, MESSAGES_KEY,
};
pub use service::note_store::{
    count_by_group, NoteStore, StoreError, StoreResult, StoreState, DEFAULT_MAX_WRITE_ATTEMPTS,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
