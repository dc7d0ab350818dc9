//! Handlers for the `/admin` pages.
//!
//! GET handlers render a view. POST handlers bind the submitted form; on validation
//! errors they render the form again (no mutation), otherwise they call the
//! [`UserService`](crate::service::UserService) and redirect with a feedback message.

pub mod admin;
pub mod roles;
pub mod users;
