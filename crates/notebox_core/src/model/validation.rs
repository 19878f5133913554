use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejection reasons for records that must not reach storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Group name is empty after trimming.
    BlankGroupName,
    /// Group id is empty.
    EmptyGroupId,
    /// Message id is empty.
    EmptyMessageId,
    /// Message does not name its owning group.
    MissingMessageGroup,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankGroupName => write!(f, "group name must not be blank"),
            Self::EmptyGroupId => write!(f, "group id must not be empty"),
            Self::EmptyMessageId => write!(f, "message id must not be empty"),
            Self::MissingMessageGroup => write!(f, "message groupId must not be empty"),
        }
    }
}

impl Error for ValidationError {}
