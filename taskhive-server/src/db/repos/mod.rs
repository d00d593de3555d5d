//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Window-function totals for list operations (no N+1)
//! - Conflicts handled via ON CONFLICT (no check-then-insert)
//! - Transactions for multi-step writes

pub mod challenges;
pub mod projects;
pub mod status_actions;
pub mod tasks;
pub mod users;

pub use challenges::{Challenge, ChallengeKind, ChallengeRepo, ChallengeSearch, NewChallenge, StatusCount, UpdateChallenge};
pub use projects::{NewProject, Project, ProjectRepo};
pub use status_actions::{
    DailySummary, NewStatusAction, StatusActionCriteria, StatusActionRepo, StatusAction,
    StatusCounts,
};
pub use tasks::{NewTask, Task, TaskAnswer, TaskRepo, UpdateTask};
pub use users::{Group, NewOsmUser, UpdateUser, User, UserRepo};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Map a sqlx error, turning unique-constraint violations into a
    /// conflict with the given reason.
    pub fn from_sqlx(err: sqlx::Error, unique_reason: &str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            // Postgres unique_violation
            if db.code().as_deref() == Some("23505") {
                return Self::conflict(unique_reason);
            }
        }
        Self::Sqlx(err)
    }
}
