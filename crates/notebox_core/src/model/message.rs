//! Message (note) domain model.
//!
//! # Invariants
//! - Serialized field names are camelCase (`groupId`, `createdAt`).
//! - `created_at` is an RFC 3339 UTC string with millisecond precision.

use crate::model::group::GroupId;
use crate::model::validation::ValidationError;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque message identifier as stored in the `msgs` blob.
pub type MessageId = String;

const UNTITLED: &str = "Untitled";
const PREVIEW_LINES: usize = 3;

/// A user note belonging to one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub group_id: GroupId,
    pub title: String,
    pub content: String,
    /// Missing in some older blobs; such records load with an empty string.
    #[serde(default)]
    pub created_at: String,
}

impl Message {
    /// Builds an unsaved message with a fresh id and the current timestamp.
    pub fn draft(group_id: impl Into<GroupId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.into(),
            title: String::new(),
            content: String::new(),
            created_at: now_timestamp(),
        }
    }

    /// Creates a message with caller-provided identity. Does not validate.
    pub fn with_id(
        id: impl Into<MessageId>,
        group_id: impl Into<GroupId>,
        title: impl Into<String>,
        content: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            group_id: group_id.into(),
            title: title.into(),
            content: content.into(),
            created_at: created_at.into(),
        }
    }

    /// Returns an edited copy: title and content replaced, identity kept.
    ///
    /// A record without a creation time gets one stamped here.
    pub fn edited(&self, title: impl Into<String>, content: impl Into<String>) -> Self {
        let created_at = if self.created_at.is_empty() {
            now_timestamp()
        } else {
            self.created_at.clone()
        };
        Self {
            id: self.id.clone(),
            group_id: self.group_id.clone(),
            title: title.into(),
            content: content.into(),
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyMessageId);
        }
        if self.group_id.is_empty() {
            return Err(ValidationError::MissingMessageGroup);
        }
        Ok(())
    }

    /// Title for list/detail display, `Untitled` when blank.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED
        } else {
            self.title.as_str()
        }
    }

    /// First three lines of content for list rows.
    pub fn preview(&self) -> String {
        self.content
            .lines()
            .take(PREVIEW_LINES)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Current UTC time in the persisted `createdAt` format.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::{now_timestamp, Message};

    #[test]
    fn draft_has_fresh_identity_and_timestamp() {
        let first = Message::draft("g1");
        let second = Message::draft("g1");
        assert_ne!(first.id, second.id);
        assert_eq!(first.group_id, "g1");
        assert!(first.title.is_empty() && first.content.is_empty());
        assert!(first.created_at.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&first.created_at).is_ok());
    }

    #[test]
    fn edited_keeps_identity_and_created_at() {
        let original = Message::with_id("m1", "g1", "T", "C", "2024-01-02T03:04:05.000Z");
        let edited = original.edited("T2", "C2");
        assert_eq!(edited.id, "m1");
        assert_eq!(edited.group_id, "g1");
        assert_eq!(edited.created_at, "2024-01-02T03:04:05.000Z");
        assert_eq!(edited.title, "T2");
        assert_eq!(edited.content, "C2");
    }

    #[test]
    fn edited_stamps_missing_created_at() {
        let edited = Message::with_id("m1", "g1", "", "", "").edited("T", "C");
        assert!(!edited.created_at.is_empty());
    }

    #[test]
    fn display_title_falls_back_to_untitled() {
        let message = Message::with_id("m1", "g1", "  ", "body", now_timestamp());
        assert_eq!(message.display_title(), "Untitled");
    }

    #[test]
    fn preview_keeps_first_three_lines() {
        let message = Message::with_id("m1", "g1", "T", "a\nb\nc\nd\ne", now_timestamp());
        assert_eq!(message.preview(), "a\nb\nc");
    }

    #[test]
    fn uses_camel_case_field_names_and_tolerates_missing_created_at() {
        let message = Message::with_id("m1", "g1", "T", "C", "2024-01-02T03:04:05.000Z");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["groupId"], "g1");
        assert_eq!(json["createdAt"], "2024-01-02T03:04:05.000Z");

        let parsed: Message =
            serde_json::from_str(r#"{"id":"m1","groupId":"g1","title":"T","content":"C"}"#)
                .unwrap();
        assert_eq!(parsed.created_at, "");
    }
}
