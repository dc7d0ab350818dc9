//! Form and view models for authorities (roles).

use super::forms::{BindingResult, FieldErrors, FormFields};
use crate::db::models::authorities::AuthorityDBResponse;
use crate::types::AuthorityId;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

fn validate_role_name(name: &str) -> Result<(), ValidationError> {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ValidationError::new("role_chars").with_message("Role names may only contain letters, digits and '_'".into()))
    }
}

/// Form-bound projection of an authority
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct RoleForm {
    pub id: Option<AuthorityId>,
    #[validate(
        length(min = 3, max = 50, message = "Role name must be between 3 and 50 characters"),
        custom(function = "validate_role_name")
    )]
    pub authority: String,
    pub is_locked: bool,
}

impl RoleForm {
    pub fn bind(fields: &FormFields) -> BindingResult<Self> {
        let mut errors = FieldErrors::default();

        let form = Self {
            id: fields.parse_optional("id", &mut errors),
            authority: fields.text("authority"),
            is_locked: fields.flag("is_locked"),
        };

        BindingResult::validate(form, errors)
    }
}

/// Authority as shown on the role list and the user form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorityResponse {
    pub id: AuthorityId,
    pub authority: String,
    pub is_locked: bool,
}

impl From<AuthorityDBResponse> for AuthorityResponse {
    fn from(db: AuthorityDBResponse) -> Self {
        Self {
            id: db.id,
            authority: db.authority,
            is_locked: db.is_locked,
        }
    }
}

/// Query string of `POST /admin/roles/update/{id}`; `?deleteRole` turns the update into a delete.
#[derive(Debug, Default, Deserialize)]
pub struct RoleActionQuery {
    #[serde(rename = "deleteRole")]
    pub delete_role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FormFields {
        FormFields::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_bind_role_form() {
        let result = RoleForm::bind(&fields(&[("id", "5"), ("authority", "ROLE_EDITOR"), ("is_locked", "on")]));
        assert!(result.errors.is_empty());
        assert_eq!(result.form.id, Some(5));
        assert_eq!(result.form.authority, "ROLE_EDITOR");
        assert!(result.form.is_locked);
    }

    #[test]
    fn test_role_name_rules() {
        let too_short = RoleForm::bind(&fields(&[("authority", "AB")]));
        assert_eq!(too_short.errors.fields().collect::<Vec<_>>(), vec!["authority"]);

        let bad_chars = RoleForm::bind(&fields(&[("authority", "ROLE EDITOR")]));
        assert_eq!(
            bad_chars.errors.get("authority").unwrap(),
            ["Role names may only contain letters, digits and '_'"]
        );

        let missing = RoleForm::bind(&fields(&[]));
        assert!(!missing.errors.is_empty());
        assert!(!missing.form.is_locked);
    }
}
