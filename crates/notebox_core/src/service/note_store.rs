//! Domain store for groups and messages.
//!
//! # Responsibility
//! - Hold the in-memory cache of both collections and the per-group counts.
//! - Run every mutation as read -> modify -> versioned commit, retrying the
//!   whole cycle when another writer got there first.
//!
//! # Invariants
//! - In-memory state changes only after the storage call succeeded.
//! - `message_counts` is derived from the message collection the operation
//!   just read or committed; it is never patched incrementally.
//! - Deleting a group removes its messages in the same atomic commit.

use crate::kv::{KvStore, KvWrite};
use crate::model::group::{Group, GroupId};
use crate::model::message::{Message, MessageId};
use crate::model::validation::ValidationError;
use crate::repo::collection_repo::{
    stage_collection, CollectionRepository, RepoError, GROUPS_KEY, MESSAGES_KEY,
};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Default bound on read-modify-write cycles per mutation.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of one domain-store operation.
#[derive(Debug)]
pub enum StoreError {
    /// Input record is not storable.
    Validation(ValidationError),
    /// Target message does not exist in storage.
    MessageNotFound(MessageId),
    /// Every attempt lost the race against another writer.
    WriteConflict { attempts: u32 },
    /// Storage read, decode or write failure.
    Repo(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::MessageNotFound(id) => write!(f, "message not found: {id}"),
            Self::WriteConflict { attempts } => {
                write!(f, "write conflict persisted after {attempts} attempt(s)")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::MessageNotFound(_) | Self::WriteConflict { .. } => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Application-scoped cache of the persisted collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    groups: Vec<Group>,
    messages: Vec<Message>,
    message_counts: BTreeMap<GroupId, usize>,
}

impl StoreState {
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_counts(&self) -> &BTreeMap<GroupId, usize> {
        &self.message_counts
    }
}

/// Single in-process authority over groups, messages and their counts.
///
/// Construct one per application and pass it to whatever needs it.
pub struct NoteStore<S: KvStore> {
    repo: CollectionRepository<S>,
    state: StoreState,
    max_write_attempts: u32,
}

impl<S: KvStore> NoteStore<S> {
    /// Creates a store with an empty cache. Call `load_groups` and
    /// `load_messages` to populate it.
    pub fn new(store: S) -> Self {
        Self {
            repo: CollectionRepository::new(store),
            state: StoreState::default(),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    /// Overrides the retry bound. Values below 1 are raised to 1.
    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn groups(&self) -> &[Group] {
        self.state.groups()
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    pub fn message_counts(&self) -> &BTreeMap<GroupId, usize> {
        self.state.message_counts()
    }

    /// Number of messages in `group_id`; 0 for unknown groups.
    pub fn message_count(&self, group_id: &str) -> usize {
        self.state
            .message_counts
            .get(group_id)
            .copied()
            .unwrap_or(0)
    }

    /// Cached messages belonging to `group_id`, in stored order.
    pub fn messages_in_group<'a>(
        &'a self,
        group_id: &'a str,
    ) -> impl Iterator<Item = &'a Message> + 'a {
        self.state
            .messages
            .iter()
            .filter(move |message| message.group_id == group_id)
    }

    pub fn find_message(&self, msg_id: &str) -> Option<&Message> {
        self.state
            .messages
            .iter()
            .find(|message| message.id == msg_id)
    }

    /// Builds an unsaved message for the "create new" flow.
    pub fn new_message_draft(&self, group_id: &str) -> Message {
        Message::draft(group_id)
    }

    /// Reloads groups and recomputes counts from one read of the messages.
    ///
    /// The cached message list is left as is.
    pub fn load_groups(&mut self) -> StoreResult<()> {
        let started_at = Instant::now();
        let loaded = self
            .repo
            .load_groups()
            .and_then(|groups| Ok((groups.items, self.repo.load_messages()?.items)))
            .map_err(StoreError::from);
        let (groups, messages) = observe("load_groups", started_at, loaded)?;

        self.state.message_counts = count_by_group(&groups, &messages);
        self.state.groups = groups;
        Ok(())
    }

    /// Appends `group` to the persisted list. Ids are not deduplicated.
    pub fn save_group(&mut self, group: Group) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = group.validate().map_err(StoreError::from).and_then(|()| {
            self.mutate("save_group", |repo| {
                let snapshot = repo.load_groups()?;
                let messages = repo.load_messages()?.items;
                let mut groups = snapshot.items;
                groups.push(group.clone());
                let write = stage_collection(GROUPS_KEY, &groups, snapshot.version)?;
                Ok((vec![write], (groups, messages)))
            })
        });
        let (groups, messages) = observe("save_group", started_at, result)?;

        info!(
            "event=group_save module=store status=ok group_id={} group_total={}",
            group.id,
            groups.len()
        );
        self.state.message_counts = count_by_group(&groups, &messages);
        self.state.groups = groups;
        Ok(())
    }

    /// Creates and persists a group from user input.
    pub fn create_group(&mut self, name: &str) -> StoreResult<Group> {
        let started_at = Instant::now();
        let group = observe(
            "create_group",
            started_at,
            Group::new(name).map_err(StoreError::from),
        )?;
        self.save_group(group.clone())?;
        Ok(group)
    }

    /// Removes a group and every message that references it.
    pub fn delete_group(&mut self, group_id: &str) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.mutate("delete_group", |repo| {
            let groups = repo.load_groups()?;
            let messages = repo.load_messages()?;
            let group_total = groups.items.len();
            let message_total = messages.items.len();

            let kept_groups: Vec<Group> = groups
                .items
                .into_iter()
                .filter(|group| group.id != group_id)
                .collect();
            let kept_messages: Vec<Message> = messages
                .items
                .into_iter()
                .filter(|message| message.group_id != group_id)
                .collect();

            let mut writes = Vec::new();
            if kept_groups.len() != group_total {
                writes.push(stage_collection(GROUPS_KEY, &kept_groups, groups.version)?);
            }
            if kept_messages.len() != message_total {
                writes.push(stage_collection(
                    MESSAGES_KEY,
                    &kept_messages,
                    messages.version,
                )?);
            }
            let removed_messages = message_total - kept_messages.len();
            Ok((writes, (kept_groups, kept_messages, removed_messages)))
        });
        let (groups, messages, removed_messages) = observe("delete_group", started_at, result)?;

        info!(
            "event=group_delete module=store status=ok group_id={group_id} removed_messages={removed_messages}"
        );
        self.state.message_counts = count_by_group(&groups, &messages);
        self.state.groups = groups;
        self.state.messages = messages;
        Ok(())
    }

    /// Replaces the cached messages with the persisted collection.
    pub fn load_messages(&mut self) -> StoreResult<()> {
        let started_at = Instant::now();
        let loaded = self
            .repo
            .load_messages()
            .map(|snapshot| snapshot.items)
            .map_err(StoreError::from);
        let messages = observe("load_messages", started_at, loaded)?;

        self.replace_messages(messages);
        Ok(())
    }

    /// Replaces the message with the same id, or appends it.
    pub fn save_message(&mut self, msg: Message) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = msg.validate().map_err(StoreError::from).and_then(|()| {
            self.mutate("save_message", |repo| {
                let snapshot = repo.load_messages()?;
                let mut messages = snapshot.items;
                let inserted = match messages.iter().position(|m| m.id == msg.id) {
                    Some(index) => {
                        messages[index] = msg.clone();
                        false
                    }
                    None => {
                        messages.push(msg.clone());
                        true
                    }
                };
                let write = stage_collection(MESSAGES_KEY, &messages, snapshot.version)?;
                Ok((vec![write], (messages, inserted)))
            })
        });
        let (messages, inserted) = observe("save_message", started_at, result)?;

        info!(
            "event=message_save module=store status=ok message_id={} group_id={} inserted={inserted}",
            msg.id, msg.group_id
        );
        self.replace_messages(messages);
        Ok(())
    }

    /// Replaces title and content of a persisted message, keeping its
    /// identity and creation time. Returns the saved record.
    ///
    /// Lookup and replacement share one read, so a message deleted by another
    /// writer is reported as missing instead of being written back.
    pub fn edit_message(
        &mut self,
        msg_id: &str,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> StoreResult<Message> {
        let started_at = Instant::now();
        let title = title.into();
        let content = content.into();
        let result = self.mutate("edit_message", |repo| {
            let snapshot = repo.load_messages()?;
            let mut messages = snapshot.items;
            let Some(index) = messages.iter().position(|message| message.id == msg_id) else {
                return Err(StoreError::MessageNotFound(msg_id.to_string()));
            };
            let updated = messages[index].edited(title.as_str(), content.as_str());
            updated.validate()?;
            messages[index] = updated.clone();
            let write = stage_collection(MESSAGES_KEY, &messages, snapshot.version)?;
            Ok((vec![write], (messages, updated)))
        });
        let (messages, updated) = observe("edit_message", started_at, result)?;

        info!(
            "event=message_edit module=store status=ok message_id={} group_id={}",
            updated.id, updated.group_id
        );
        self.replace_messages(messages);
        Ok(updated)
    }

    /// Deletes one message. Returns whether it existed.
    pub fn delete_message(&mut self, msg_id: &str) -> StoreResult<bool> {
        let started_at = Instant::now();
        let result = self.mutate("delete_message", |repo| {
            let snapshot = repo.load_messages()?;
            let mut messages = snapshot.items;
            let Some(index) = messages.iter().position(|message| message.id == msg_id) else {
                return Ok((Vec::new(), (messages, false)));
            };
            messages.remove(index);
            let write = stage_collection(MESSAGES_KEY, &messages, snapshot.version)?;
            Ok((vec![write], (messages, true)))
        });
        let (messages, removed) = observe("delete_message", started_at, result)?;

        info!("event=message_delete module=store status=ok message_id={msg_id} removed={removed}");
        self.replace_messages(messages);
        Ok(removed)
    }

    fn replace_messages(&mut self, messages: Vec<Message>) {
        self.state.message_counts = count_by_group(&self.state.groups, &messages);
        self.state.messages = messages;
    }

    /// Runs `attempt` until its writes commit without a version conflict.
    ///
    /// `attempt` must derive its writes only from what it reads through
    /// `repo`, so re-running it after a conflict is safe.
    fn mutate<T>(
        &self,
        op: &'static str,
        mut attempt: impl FnMut(&CollectionRepository<S>) -> StoreResult<(Vec<KvWrite>, T)>,
    ) -> StoreResult<T> {
        for attempt_no in 1..=self.max_write_attempts {
            let (writes, outcome) = attempt(&self.repo)?;
            match self.repo.commit(&writes) {
                Ok(()) => return Ok(outcome),
                Err(err) if err.is_conflict() => {
                    warn!(
                        "event=store_write module=store status=retry op={op} attempt={attempt_no} error={err}"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(StoreError::WriteConflict {
            attempts: self.max_write_attempts,
        })
    }
}

/// Counts messages per group id.
///
/// Every group in `groups` gets an entry, zero when it has no messages.
/// Messages whose group is unknown are still counted under their `groupId`.
pub fn count_by_group(groups: &[Group], messages: &[Message]) -> BTreeMap<GroupId, usize> {
    let mut counts: BTreeMap<GroupId, usize> =
        groups.iter().map(|group| (group.id.clone(), 0)).collect();
    for message in messages {
        *counts.entry(message.group_id.clone()).or_insert(0) += 1;
    }
    counts
}

fn observe<T>(op: &'static str, started_at: Instant, result: StoreResult<T>) -> StoreResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!("event=store_op module=store status=ok op={op} duration_ms={duration_ms}"),
        Err(err) => error!(
            "event=store_op module=store status=error op={op} duration_ms={duration_ms} error={err}"
        ),
    }
    result
}
