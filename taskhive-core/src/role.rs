//! Project group roles
//!
//! Every project owns one group per role; membership in a group grants
//! that role on the project. Roles are ordered: admin implies write,
//! write implies read.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Role granted by membership in a project group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Write,
    Read,
}

impl Role {
    /// Integer form stored in `groups.role`.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Admin => 1,
            Self::Write => 2,
            Self::Read => 3,
        }
    }

    /// Parse the stored integer form.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Admin),
            2 => Some(Self::Write),
            3 => Some(Self::Read),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Write => "write",
            Self::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "admin" => Ok(Self::Admin),
            "write" => Ok(Self::Write),
            "read" => Ok(Self::Read),
            other => Err(CoreError::UnknownRole {
                value: other.to_owned(),
            }),
        }
    }

    /// Whether a member holding `self` satisfies a requirement of `required`.
    ///
    /// Lower integers are stronger, so admin (1) grants write (2) and read (3).
    pub fn grants(self, required: Role) -> bool {
        self.as_i32() <= required.as_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_grants_everything() {
        assert!(Role::Admin.grants(Role::Admin));
        assert!(Role::Admin.grants(Role::Write));
        assert!(Role::Admin.grants(Role::Read));
    }

    #[test]
    fn write_grants_read_not_admin() {
        assert!(!Role::Write.grants(Role::Admin));
        assert!(Role::Write.grants(Role::Write));
        assert!(Role::Write.grants(Role::Read));
    }

    #[test]
    fn read_grants_only_read() {
        assert!(!Role::Read.grants(Role::Admin));
        assert!(!Role::Read.grants(Role::Write));
        assert!(Role::Read.grants(Role::Read));
    }

    #[test]
    fn i32_round_trip() {
        for role in [Role::Admin, Role::Write, Role::Read] {
            assert_eq!(Role::from_i32(role.as_i32()), Some(role));
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
        assert_eq!(Role::from_i32(0), None);
    }
}
