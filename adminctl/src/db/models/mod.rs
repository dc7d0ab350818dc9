//! Database request and response records.
//!
//! `*CreateDBRequest` / `*UpdateDBRequest` are what the repositories accept, `*DBResponse`
//! is what they hand back. Row structs matching the table layout stay private to the
//! repositories in [`crate::db::handlers`].

pub mod authorities;
pub mod users;
