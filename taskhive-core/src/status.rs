//! Task status model
//!
//! Statuses are stored as integers in the database and travel as
//! lowercase snake_case strings on the wire. A task starts as `Created`
//! and moves through the workflow as users act on it; every transition
//! is audited by the server's status-action log.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Freshly created, nobody has worked it yet
    Created,
    /// Work completed, underlying issue fixed
    Fixed,
    /// Reported issue was not actually a problem
    FalsePositive,
    /// User looked and moved on
    Skipped,
    /// Task removed from the pool
    Deleted,
    /// Issue was already resolved elsewhere
    AlreadyFixed,
    /// User gave up on it
    TooHard,
    /// Survey task answered
    Answered,
}

impl TaskStatus {
    /// All statuses, in storage order.
    pub const ALL: [TaskStatus; 8] = [
        Self::Created,
        Self::Fixed,
        Self::FalsePositive,
        Self::Skipped,
        Self::Deleted,
        Self::AlreadyFixed,
        Self::TooHard,
        Self::Answered,
    ];

    /// Integer form stored in the `tasks.status` and
    /// `status_actions.*_status` columns.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Created => 0,
            Self::Fixed => 1,
            Self::FalsePositive => 2,
            Self::Skipped => 3,
            Self::Deleted => 4,
            Self::AlreadyFixed => 5,
            Self::TooHard => 6,
            Self::Answered => 7,
        }
    }

    /// Parse the stored integer form.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Created),
            1 => Some(Self::Fixed),
            2 => Some(Self::FalsePositive),
            3 => Some(Self::Skipped),
            4 => Some(Self::Deleted),
            5 => Some(Self::AlreadyFixed),
            6 => Some(Self::TooHard),
            7 => Some(Self::Answered),
            _ => None,
        }
    }

    /// Wire/string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Fixed => "fixed",
            Self::FalsePositive => "false_positive",
            Self::Skipped => "skipped",
            Self::Deleted => "deleted",
            Self::AlreadyFixed => "already_fixed",
            Self::TooHard => "too_hard",
            Self::Answered => "answered",
        }
    }

    /// Parse the wire form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "created" => Ok(Self::Created),
            "fixed" => Ok(Self::Fixed),
            "false_positive" => Ok(Self::FalsePositive),
            "skipped" => Ok(Self::Skipped),
            "deleted" => Ok(Self::Deleted),
            "already_fixed" => Ok(Self::AlreadyFixed),
            "too_hard" => Ok(Self::TooHard),
            "answered" => Ok(Self::Answered),
            other => Err(CoreError::UnknownStatus {
                value: other.to_owned(),
            }),
        }
    }

    /// Whether this status still accepts normal work.
    ///
    /// Open statuses may move anywhere; terminal ones only back to
    /// `Created` (reset) or `Deleted`.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Created | Self::Skipped | Self::TooHard)
    }

    /// Check whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        if self == next {
            return false;
        }
        if self.is_open() {
            return true;
        }
        matches!(next, Self::Created | Self::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::from_i32(status.as_i32()), Some(status));
        }
        assert_eq!(TaskStatus::from_i32(42), None);
    }

    #[test]
    fn parse_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TaskStatus::parse("nope").is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&TaskStatus::FalsePositive).unwrap();
        assert_eq!(json, "\"false_positive\"");
        let back: TaskStatus = serde_json::from_str("\"too_hard\"").unwrap();
        assert_eq!(back, TaskStatus::TooHard);
    }

    #[test]
    fn open_statuses_go_anywhere() {
        assert!(TaskStatus::Created.can_transition_to(TaskStatus::Fixed));
        assert!(TaskStatus::Skipped.can_transition_to(TaskStatus::TooHard));
        assert!(TaskStatus::TooHard.can_transition_to(TaskStatus::Answered));
    }

    #[test]
    fn terminal_statuses_only_reset_or_delete() {
        assert!(TaskStatus::Fixed.can_transition_to(TaskStatus::Created));
        assert!(TaskStatus::Fixed.can_transition_to(TaskStatus::Deleted));
        assert!(!TaskStatus::Fixed.can_transition_to(TaskStatus::Skipped));
        assert!(!TaskStatus::Answered.can_transition_to(TaskStatus::Fixed));
    }

    #[test]
    fn self_transition_rejected() {
        assert!(!TaskStatus::Created.can_transition_to(TaskStatus::Created));
        assert!(!TaskStatus::Fixed.can_transition_to(TaskStatus::Fixed));
    }
}
