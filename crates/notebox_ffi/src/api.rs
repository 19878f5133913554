//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose group/message use-cases to Dart via FRB.
//! - Own the one process-wide `NoteStore` behind an explicit `store_init`.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Store-backed functions are not `sync`; Dart receives them as futures
//!   executed on the bridge worker pool.
//! - Every store call is serialized through one mutex.

use log::{error, info};
use notebox_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Group, Message, NoteStore, SqliteKvStore, StoreConfig, StoreError,
};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Message id used by the detail route to request a fresh draft.
pub const NEW_MESSAGE_ID: &str = "new";

static APP_CONTEXT: OnceLock<AppContext> = OnceLock::new();

struct AppContext {
    db_path: PathBuf,
    store: Mutex<Option<NoteStore<SqliteKvStore>>>,
}

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - `level`: `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory for rolling log files.
/// - Returns empty string on success and an error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Group row for the group list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupItem {
    pub id: String,
    pub name: String,
    pub message_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupListResponse {
    pub ok: bool,
    pub items: Vec<GroupItem>,
    pub message: String,
}

/// Message projection for list and detail views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageItem {
    pub id: String,
    pub group_id: String,
    /// Raw title, possibly empty.
    pub title: String,
    /// Title or `Untitled`.
    pub display_title: String,
    pub content: String,
    /// First three lines of `content`.
    pub preview: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageListResponse {
    pub ok: bool,
    pub items: Vec<MessageItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDetailResponse {
    pub ok: bool,
    pub item: Option<MessageItem>,
    /// True for an unsaved draft created by the `new` route.
    pub is_new: bool,
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Affected entity id when the action targets one.
    pub id: Option<String>,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            ok: true,
            id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// Opens the note database and creates the process-wide store.
///
/// Blank `db_path` falls back to `NOTEBOX_DB_PATH`, then the temp dir.
/// Repeating the call with the same path is a no-op; a different path is
/// rejected.
pub fn store_init(db_path: String) -> ActionResponse {
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => return ActionResponse::failure(format!("store_init failed: {err}")),
    };
    let requested = match db_path.trim() {
        "" => config.db_path.clone(),
        path => PathBuf::from(path),
    };

    // The slot stays empty until an open succeeds, so a failed open can be retried.
    let context = APP_CONTEXT.get_or_init(|| AppContext {
        db_path: requested.clone(),
        store: Mutex::new(None),
    });
    if context.db_path != requested {
        return ActionResponse::failure(format!(
            "store already initialized at `{}`; refusing to switch to `{}`",
            context.db_path.display(),
            requested.display()
        ));
    }

    let mut store = context.store.lock().unwrap_or_else(PoisonError::into_inner);
    if store.is_none() {
        let config = StoreConfig {
            db_path: requested,
            ..config
        };
        match config.open_store() {
            Ok(opened) => {
                info!(
                    "event=store_init module=ffi status=ok db_path={}",
                    config.db_path.display()
                );
                *store = Some(opened);
            }
            Err(err) => {
                error!("event=store_init module=ffi status=error error={err}");
                return ActionResponse::failure(format!("store_init failed: {err}"));
            }
        }
    }
    ActionResponse::success("Store ready.", None)
}

/// Loads all groups with their message counts.
pub fn groups_load() -> GroupListResponse {
    let loaded = with_store(|store| {
        store.load_groups()?;
        Ok(store
            .groups()
            .iter()
            .map(|group| to_group_item(group, store.message_count(&group.id)))
            .collect::<Vec<_>>())
    });
    match loaded {
        Ok(items) => GroupListResponse {
            message: format!("Loaded {} group(s).", items.len()),
            ok: true,
            items,
        },
        Err(err) => GroupListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("groups_load failed: {err}"),
        },
    }
}

/// Creates a group from user input. Blank names are rejected.
pub fn group_create(name: String) -> ActionResponse {
    match with_store(|store| store.create_group(&name)) {
        Ok(group) => ActionResponse::success("Group created.", Some(group.id)),
        Err(err) => ActionResponse::failure(format!("group_create failed: {err}")),
    }
}

/// Deletes a group and all of its messages.
pub fn group_delete(group_id: String) -> ActionResponse {
    match with_store(|store| store.delete_group(&group_id)) {
        Ok(()) => ActionResponse::success("Group deleted.", Some(group_id)),
        Err(err) => ActionResponse::failure(format!("group_delete failed: {err}")),
    }
}

/// Reloads messages and returns those belonging to `group_id`.
pub fn messages_load_for_group(group_id: String) -> MessageListResponse {
    let loaded = with_store(|store| {
        store.load_messages()?;
        Ok(store
            .messages_in_group(&group_id)
            .map(to_message_item)
            .collect::<Vec<_>>())
    });
    match loaded {
        Ok(items) => MessageListResponse {
            message: if items.is_empty() {
                "No messages in this group.".to_string()
            } else {
                format!("Loaded {} message(s).", items.len())
            },
            ok: true,
            items,
        },
        Err(err) => MessageListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("messages_load_for_group failed: {err}"),
        },
    }
}

/// Opens one message for the detail view.
///
/// `msg_id == "new"` returns an unsaved draft for `group_id`; the draft is
/// persisted only by `message_save`.
pub fn message_open(msg_id: String, group_id: Option<String>) -> MessageDetailResponse {
    if msg_id == NEW_MESSAGE_ID {
        let group_id = group_id.unwrap_or_default();
        if group_id.trim().is_empty() {
            return detail_failure("message_open failed: group_id is required for a new message");
        }
        return MessageDetailResponse {
            ok: true,
            item: Some(to_message_item(&Message::draft(group_id))),
            is_new: true,
            message: "New message.".to_string(),
        };
    }

    let found = with_store(|store| {
        store.load_messages()?;
        Ok(store.find_message(&msg_id).map(to_message_item))
    });
    match found {
        Ok(Some(item)) => MessageDetailResponse {
            ok: true,
            item: Some(item),
            is_new: false,
            message: "Message loaded.".to_string(),
        },
        Ok(None) => detail_failure(format!("message_open failed: message not found: {msg_id}")),
        Err(err) => detail_failure(format!("message_open failed: {err}")),
    }
}

/// Saves a message from the detail view.
///
/// An existing message keeps its group and creation time; only title and
/// content change. An unknown id is inserted as a new message, stamped with
/// `created_at` or the current time when blank. Blank ids and the reserved
/// `new` route id are rejected.
pub fn message_save(
    msg_id: String,
    group_id: String,
    title: String,
    content: String,
    created_at: String,
) -> ActionResponse {
    if msg_id.trim().is_empty() || msg_id == NEW_MESSAGE_ID {
        return ActionResponse::failure(format!(
            "message_save failed: `{msg_id}` is not a valid message id"
        ));
    }
    let saved = with_store(|store| match store.edit_message(&msg_id, title.clone(), content.clone()) {
        Err(StoreError::MessageNotFound(_)) => {
            let created_at = if created_at.trim().is_empty() {
                notebox_core::now_timestamp()
            } else {
                created_at.clone()
            };
            let message = Message::with_id(
                msg_id.clone(),
                group_id.clone(),
                title.clone(),
                content.clone(),
                created_at,
            );
            store.save_message(message.clone())?;
            Ok(message)
        }
        other => other,
    });
    match saved {
        Ok(message) => ActionResponse::success("Message saved.", Some(message.id)),
        Err(err) => ActionResponse::failure(format!("message_save failed: {err}")),
    }
}

/// Deletes one message.
pub fn message_delete(msg_id: String) -> ActionResponse {
    match with_store(|store| store.delete_message(&msg_id)) {
        Ok(true) => ActionResponse::success("Message deleted.", Some(msg_id)),
        Ok(false) => ActionResponse::success("Message already absent.", Some(msg_id)),
        Err(err) => ActionResponse::failure(format!("message_delete failed: {err}")),
    }
}

fn with_store<T>(
    f: impl FnOnce(&mut NoteStore<SqliteKvStore>) -> Result<T, StoreError>,
) -> Result<T, String> {
    let context = APP_CONTEXT
        .get()
        .ok_or_else(|| "store not initialized; call store_init first".to_string())?;
    let mut slot = context.store.lock().unwrap_or_else(PoisonError::into_inner);
    let store = slot
        .as_mut()
        .ok_or_else(|| "store not initialized; call store_init first".to_string())?;
    f(store).map_err(|err| err.to_string())
}

fn to_group_item(group: &Group, message_count: usize) -> GroupItem {
    GroupItem {
        id: group.id.clone(),
        name: group.name.clone(),
        message_count: u32::try_from(message_count).unwrap_or(u32::MAX),
    }
}

fn to_message_item(message: &Message) -> MessageItem {
    MessageItem {
        id: message.id.clone(),
        group_id: message.group_id.clone(),
        title: message.title.clone(),
        display_title: message.display_title().to_string(),
        content: message.content.clone(),
        preview: message.preview(),
        created_at: message.created_at.clone(),
    }
}

fn detail_failure(message: impl Into<String>) -> MessageDetailResponse {
    MessageDetailResponse {
        ok: false,
        item: None,
        is_new: false,
        message: message.into(),
    }
}
