//! Form and view models for users.

use super::forms::{BindingResult, FieldErrors, FormFields};
use super::roles::AuthorityResponse;
use crate::db::models::users::UserDBResponse;
use crate::types::{AuthorityId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

/// How a user signs in. Accounts created from the admin pages always use [`SignInProvider::Site`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "sign_in_provider", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SignInProvider {
    #[default]
    Site,
    Github,
    Google,
    Twitter,
    Facebook,
    LinkedIn,
}

impl SignInProvider {
    pub const ALL: [SignInProvider; 6] = [
        SignInProvider::Site,
        SignInProvider::Github,
        SignInProvider::Google,
        SignInProvider::Twitter,
        SignInProvider::Facebook,
        SignInProvider::LinkedIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignInProvider::Site => "SITE",
            SignInProvider::Github => "GITHUB",
            SignInProvider::Google => "GOOGLE",
            SignInProvider::Twitter => "TWITTER",
            SignInProvider::Facebook => "FACEBOOK",
            SignInProvider::LinkedIn => "LINKEDIN",
        }
    }
}

impl fmt::Display for SignInProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignInProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignInProvider::ALL
            .into_iter()
            .find(|provider| provider.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown sign-in provider '{s}'"))
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        Ok(())
    } else {
        Err(ValidationError::new("username_chars")
            .with_message("Username may only contain letters, digits, '.', '_' and '-'".into()))
    }
}

/// Form-bound projection of a user, used both to populate the user form and to carry a
/// submission to the service.
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct UserForm {
    pub user_id: Option<UserId>,
    #[validate(
        length(min = 3, max = 15, message = "Username must be between 3 and 15 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(
        email(message = "Email address is not valid"),
        length(max = 128, message = "Email must be at most 128 characters")
    )]
    pub email: String,
    #[validate(length(min = 1, max = 25, message = "First name must be between 1 and 25 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 25, message = "Last name must be between 1 and 25 characters"))]
    pub last_name: String,
    /// Only set server-side (new accounts get a random one); never rendered back.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub sign_in_provider: SignInProvider,
    /// Ids of the authorities selected on the form
    pub authorities: Vec<AuthorityId>,
    /// When set, the service also replaces the user's authority memberships
    pub update_children: bool,
}

impl UserForm {
    /// Bind a submission. `user_id` is left unset: the handler knows which user the
    /// request targets, so a body value is never trusted or parsed.
    pub fn bind(fields: &FormFields) -> BindingResult<Self> {
        let mut errors = FieldErrors::default();

        let form = Self {
            user_id: None,
            username: fields.text("username"),
            email: fields.text("email"),
            first_name: fields.text("first_name"),
            last_name: fields.text("last_name"),
            password: None,
            sign_in_provider: fields.parse_optional("sign_in_provider", &mut errors).unwrap_or_default(),
            authorities: fields.parse_all("authorities", &mut errors),
            update_children: false,
        };

        BindingResult::validate(form, errors)
    }
}

impl From<&UserDBResponse> for UserForm {
    fn from(user: &UserDBResponse) -> Self {
        Self {
            user_id: Some(user.id),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            password: None,
            sign_in_provider: user.sign_in_provider,
            authorities: user.authorities.iter().map(|a| a.id).collect(),
            update_children: false,
        }
    }
}

/// User as shown on the user list page
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub sign_in_provider: SignInProvider,
    pub enabled: bool,
    pub authorities: Vec<AuthorityResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            sign_in_provider: db.sign_in_provider,
            enabled: db.enabled,
            authorities: db.authorities.into_iter().map(AuthorityResponse::from).collect(),
            created_at: db.created_at,
        }
    }
}

/// Query string of `GET /admin/users`; `id` marks the user that was just saved.
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub id: Option<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FormFields {
        FormFields::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_bind_valid_user_form() {
        let result = UserForm::bind(&fields(&[
            ("user_id", "12"),
            ("username", " jdoe "),
            ("email", "jdoe@example.com"),
            ("first_name", "Jane"),
            ("last_name", "Doe"),
            ("sign_in_provider", "google"),
            ("authorities", "1"),
            ("authorities", "2"),
        ]));

        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        let form = result.form;
        assert_eq!(form.user_id, None);
        assert_eq!(form.username, "jdoe");
        assert_eq!(form.sign_in_provider, SignInProvider::Google);
        assert_eq!(form.authorities, vec![1, 2]);
        assert!(!form.update_children);
        assert!(form.password.is_none());
    }

    #[test]
    fn test_bind_reports_constraint_and_conversion_errors_together() {
        let result = UserForm::bind(&fields(&[
            ("username", "a!"),
            ("email", "not-an-email"),
            ("first_name", ""),
            ("last_name", "Doe"),
            ("authorities", "admin"),
        ]));

        assert!(!result.errors.is_empty());
        let fields: Vec<_> = result.errors.fields().collect();
        assert_eq!(fields, vec!["authorities", "email", "first_name", "username"]);
        // "a!" fails both the length rule and the character rule
        assert_eq!(result.errors.get("username").map(|m| m.len()), Some(2));
    }

    #[test]
    fn test_body_user_id_is_not_parsed() {
        let result = UserForm::bind(&fields(&[
            ("user_id", "abc"),
            ("username", "jdoe"),
            ("email", "jdoe@example.com"),
            ("first_name", "Jane"),
            ("last_name", "Doe"),
        ]));

        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        assert_eq!(result.form.user_id, None);
    }

    #[test]
    fn test_sign_in_provider_parsing() {
        assert_eq!("SITE".parse::<SignInProvider>(), Ok(SignInProvider::Site));
        assert_eq!("LinkedIn".parse::<SignInProvider>(), Ok(SignInProvider::LinkedIn));
        assert!("myspace".parse::<SignInProvider>().is_err());
        assert_eq!(SignInProvider::default(), SignInProvider::Site);
    }

    #[test]
    fn test_password_is_never_serialized() {
        let form = UserForm {
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&form).unwrap();
        assert!(json.get("password").is_none());
    }
}
