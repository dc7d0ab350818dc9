//! Form binding for the server-rendered admin pages.
//!
//! Submitted forms are decoded into [`FormFields`] (an ordered list of key/value pairs, so
//! repeated keys such as checkbox groups survive), then bound onto a typed form struct.
//! Values that cannot be converted (e.g. a non-numeric id) are recorded as field errors
//! instead of failing the request, and the struct's `validator` constraints are checked
//! afterwards. Both kinds of failure end up in the same [`BindingResult`], so handlers only
//! have one thing to look at.

use axum::{
    Form,
    extract::{FromRequest, Request, rejection::FormRejection},
    http::header::CONTENT_TYPE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use validator::Validate;

/// Raw `application/x-www-form-urlencoded` body, in submission order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// First value submitted for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Every value submitted for `key`.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Trimmed text value, empty when absent.
    pub fn text(&self, key: &str) -> String {
        self.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
    }

    /// Checkbox semantics: present and not explicitly "false"/"off".
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !matches!(v.trim(), "false" | "off" | "0"))
    }

    /// Parse an optional value. Missing or blank values are `None`; unparseable ones are
    /// recorded in `errors`.
    pub fn parse_optional<T: FromStr>(&self, key: &'static str, errors: &mut FieldErrors) -> Option<T> {
        let raw = self.get(key)?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                errors.add(key, format!("'{raw}' is not a valid value"));
                None
            }
        }
    }

    /// Parse every non-blank value submitted for `key`, recording the ones that do not parse.
    pub fn parse_all<T: FromStr>(&self, key: &'static str, errors: &mut FieldErrors) -> Vec<T> {
        let mut values = Vec::new();
        for raw in self.get_all(key).map(str::trim).filter(|v| !v.is_empty()) {
            match raw.parse() {
                Ok(value) => values.push(value),
                Err(_) => errors.add(key, format!("'{raw}' is not a valid value")),
            }
        }
        values
    }
}

/// A submission without a `Content-Type` carries no fields; it binds as an empty form and
/// fails validation like any other incomplete submission.
impl<S: Send + Sync> FromRequest<S> for FormFields {
    type Rejection = FormRejection;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        if !req.headers().contains_key(CONTENT_TYPE) {
            return Ok(Self::default());
        }
        let Form(fields) = Form::<FormFields>::from_request(req, state).await?;
        Ok(fields)
    }
}

/// Field name -> human readable messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A bound form together with any binding and validation errors.
#[derive(Debug, Clone)]
pub struct BindingResult<T> {
    pub form: T,
    pub errors: FieldErrors,
}

impl<T: Validate> BindingResult<T> {
    /// Run the form's validation rules on top of the errors already collected while binding.
    pub fn validate(form: T, mut errors: FieldErrors) -> Self {
        if let Err(validation) = form.validate() {
            for (field, field_errors) in validation.field_errors() {
                for error in field_errors.iter() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("is invalid ({})", error.code));
                    errors.add(field.to_string(), message);
                }
            }
        }
        Self { form, errors }
    }
}
