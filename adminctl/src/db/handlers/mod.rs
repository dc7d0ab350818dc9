//! Repositories over the security tables.
//!
//! Each repository borrows a `PgConnection` for its lifetime, so callers decide whether the
//! work runs on a pooled connection or inside a transaction.

pub mod authorities;
pub mod repository;
pub mod users;

pub use authorities::Authorities;
pub use repository::Repository;
pub use users::Users;
