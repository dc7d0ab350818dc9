//! Text for feedback message keys.

use std::collections::HashMap;

pub const USER_UPDATED: &str = "feedback.message.user.updated";
pub const USER_ADDED: &str = "feedback.message.user.added";
pub const ROLE_ADDED: &str = "feedback.message.role.added";
pub const ROLE_UPDATED: &str = "feedback.message.role.updated";
pub const ROLE_ERROR: &str = "feedback.message.role.error";
pub const ROLE_IS_LOCKED: &str = "feedback.message.role.islocked";
pub const ROLE_DELETED: &str = "feedback.message.role.deleted";

const ENGLISH: &[(&str, &str)] = &[
    (USER_UPDATED, "User {0} {1} was updated."),
    (USER_ADDED, "User {0} {1} was added."),
    (ROLE_ADDED, "Role {0} was added."),
    (ROLE_UPDATED, "Role {0} was updated."),
    (ROLE_ERROR, "The role could not be saved. Role names are 3 to 50 letters, digits or underscores."),
    (ROLE_IS_LOCKED, "This role is locked and cannot be changed or deleted."),
    (ROLE_DELETED, "Role {0} was deleted and removed from {1} user(s)."),
];

/// Message templates keyed by message key, with `{0}`, `{1}`, ... positional placeholders.
#[derive(Debug, Clone)]
pub struct MessageBundle {
    messages: HashMap<String, String>,
}

impl MessageBundle {
    pub fn english() -> Self {
        Self {
            messages: ENGLISH.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    /// Resolve `key` with `args` substituted. Unknown keys resolve to the key itself.
    pub fn resolve(&self, key: &str, args: &[String]) -> String {
        let Some(template) = self.messages.get(key) else {
            return key.to_string();
        };

        args.iter()
            .enumerate()
            .fold(template.clone(), |text, (i, arg)| text.replace(&format!("{{{i}}}"), arg))
    }
}

impl Default for MessageBundle {
    fn default() -> Self {
        Self::english()
    }
}
