//! Form, query and view models for the admin pages.

pub mod forms;
pub mod roles;
pub mod users;
