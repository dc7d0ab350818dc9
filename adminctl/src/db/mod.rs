//! Database layer: repositories, request/response records and error mapping.
//!
//! Schema lives in `migrations/` and is embedded with [`sqlx::migrate!`] in
//! [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
