//! Database models for users.

use crate::api::models::users::{SignInProvider, UserForm};
use crate::db::models::authorities::AuthorityDBResponse;
use crate::types::{AuthorityId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub sign_in_provider: SignInProvider,
    pub authority_ids: Vec<AuthorityId>,
}

impl UserCreateDBRequest {
    pub fn new(form: &UserForm, password_hash: String) -> Self {
        Self {
            username: form.username.clone(),
            email: form.email.clone(),
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            password_hash,
            sign_in_provider: form.sign_in_provider,
            authority_ids: form.authorities.clone(),
        }
    }
}

/// Database request for updating a user
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub sign_in_provider: Option<SignInProvider>,
    /// `Some` replaces the user's memberships, `None` leaves them alone
    pub authority_ids: Option<Vec<AuthorityId>>,
}

impl From<&UserForm> for UserUpdateDBRequest {
    fn from(form: &UserForm) -> Self {
        Self {
            username: Some(form.username.clone()),
            email: Some(form.email.clone()),
            first_name: Some(form.first_name.clone()),
            last_name: Some(form.last_name.clone()),
            sign_in_provider: Some(form.sign_in_provider),
            authority_ids: form.update_children.then(|| form.authorities.clone()),
        }
    }
}

/// Database response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub sign_in_provider: SignInProvider,
    pub enabled: bool,
    pub authorities: Vec<AuthorityDBResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_only_touches_memberships_when_asked() {
        let mut form = UserForm {
            user_id: Some(3),
            username: "jdoe".to_string(),
            authorities: vec![1, 2],
            ..Default::default()
        };

        assert_eq!(UserUpdateDBRequest::from(&form).authority_ids, None);

        form.update_children = true;
        assert_eq!(UserUpdateDBRequest::from(&form).authority_ids, Some(vec![1, 2]));
    }
}
