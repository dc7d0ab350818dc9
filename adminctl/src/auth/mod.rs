//! Credential handling for accounts managed from the admin pages.

pub mod password;
