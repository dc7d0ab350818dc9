//! One-shot feedback messages carried across a redirect.
//!
//! A mutating handler redirects with a [`Feedback`] stored in a cookie; the next rendered
//! page reads it through the [`Flash`] extractor, shows it, and clears the cookie. The
//! cookie value is base64url encoded JSON, so it never needs quoting.

use crate::AppState;
use crate::config::FlashConfig;
use crate::errors::{Error, Result};
use crate::web::messages::MessageBundle;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::debug;

/// A message key plus its positional arguments, resolved through a [`MessageBundle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub key: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Feedback {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }
}

pub fn encode(feedback: &Feedback) -> Result<String> {
    let json = serde_json::to_vec(feedback).map_err(|e| Error::Internal {
        operation: format!("encode feedback: {e}"),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub fn decode(value: &str) -> Option<Feedback> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn cookie(config: &FlashConfig, value: &str, max_age: Option<u32>) -> String {
    let mut cookie = format!("{}={}; Path=/admin; HttpOnly; SameSite=Lax", config.cookie_name, value);
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn set_cookie(feedback: &Feedback, config: &FlashConfig) -> Result<String> {
    Ok(cookie(config, &encode(feedback)?, None))
}

pub fn clear_cookie(config: &FlashConfig) -> String {
    cookie(config, "", Some(0))
}

/// `303 See Other` to `to`, with `feedback` waiting for the next page.
pub fn redirect_with_feedback(to: &str, feedback: Feedback, config: &FlashConfig) -> Result<Response> {
    let cookie = set_cookie(&feedback, config)?;
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Redirect::to(to)).into_response())
}

/// Feedback left by the previous request, if any.
#[derive(Debug, Clone, Default)]
pub struct Flash {
    feedback: Option<Feedback>,
    cookie_present: bool,
}

impl Flash {
    /// Whether the request carried a flash cookie (valid or not) that should be cleared.
    pub fn is_pending(&self) -> bool {
        self.cookie_present
    }

    pub fn message(&self, messages: &MessageBundle) -> Option<String> {
        self.feedback.as_ref().map(|f| messages.resolve(&f.key, &f.args))
    }
}

fn read_cookie<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    let cookie_str = parts.headers.get(header::COOKIE)?.to_str().ok()?;

    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

impl FromRequestParts<AppState> for Flash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let Some(value) = read_cookie(parts, &state.config.flash.cookie_name) else {
            return Ok(Flash::default());
        };

        let feedback = decode(value);
        if feedback.is_none() && !value.is_empty() {
            debug!("Ignoring malformed flash cookie");
        }

        Ok(Flash {
            feedback,
            cookie_present: !value.is_empty(),
        })
    }
}
