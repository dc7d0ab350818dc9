//! Common type definitions.
//!
//! # ID Types
//!
//! Users and authorities are keyed by database sequences, wrapped in type aliases so that
//! signatures say which entity an id belongs to:
//!
//! - [`UserId`]: User account identifier
//! - [`AuthorityId`]: Authority (role) identifier
//!
//! # Operations
//!
//! [`Operation`] names the kind of mutation being attempted. It is carried by
//! [`crate::db::errors::DbError::ProtectedEntity`] when the storage layer refuses to touch a
//! protected row.

use std::fmt;

// Type aliases for IDs
pub type UserId = i64;
pub type AuthorityId = i64;

/// Sentinel id used by the "new user" form, which shares its population logic with the edit form.
pub const NEW_ENTITY_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Update.to_string(), "update");
        assert_eq!(format!("cannot {}", Operation::Delete), "cannot delete");
    }
}
