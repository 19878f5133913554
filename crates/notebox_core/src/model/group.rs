//! Group domain model.

use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque group identifier as stored in the `groups` blob.
pub type GroupId = String;

/// User-defined category that owns zero or more messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

impl Group {
    /// Creates a group with a generated id from user input.
    ///
    /// The name is stored as entered; blank input is rejected.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let group = Self::with_id(Uuid::new_v4().to_string(), name);
        group.validate()?;
        Ok(group)
    }

    /// Creates a group with a caller-provided id. Does not validate.
    pub fn with_id(id: impl Into<GroupId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyGroupId);
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankGroupName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Group;
    use crate::model::validation::ValidationError;

    #[test]
    fn new_keeps_name_as_entered_and_generates_distinct_ids() {
        let first = Group::new("  Work ").unwrap();
        let second = Group::new("Work").unwrap();
        assert_eq!(first.name, "  Work ");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn new_rejects_blank_name() {
        assert_eq!(Group::new(" \t ").unwrap_err(), ValidationError::BlankGroupName);
    }

    #[test]
    fn serializes_to_persisted_shape() {
        let json = serde_json::to_string(&Group::with_id("g1", "Work")).unwrap();
        assert_eq!(json, r#"{"id":"g1","name":"Work"}"#);
    }
}
