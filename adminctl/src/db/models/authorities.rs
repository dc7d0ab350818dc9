//! Database models for authorities (roles).

use crate::api::models::roles::RoleForm;
use crate::types::AuthorityId;

/// Database request for creating a new authority
#[derive(Debug, Clone)]
pub struct AuthorityCreateDBRequest {
    pub authority: String,
    pub is_locked: bool,
}

impl From<&RoleForm> for AuthorityCreateDBRequest {
    fn from(form: &RoleForm) -> Self {
        Self {
            authority: form.authority.clone(),
            is_locked: form.is_locked,
        }
    }
}

/// Database request for updating an authority
#[derive(Debug, Clone, Default)]
pub struct AuthorityUpdateDBRequest {
    pub authority: Option<String>,
    pub is_locked: Option<bool>,
}

impl From<&RoleForm> for AuthorityUpdateDBRequest {
    fn from(form: &RoleForm) -> Self {
        Self {
            authority: Some(form.authority.clone()),
            is_locked: Some(form.is_locked),
        }
    }
}

/// Database response for an authority
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorityDBResponse {
    pub id: AuthorityId,
    pub authority: String,
    pub is_locked: bool,
}
