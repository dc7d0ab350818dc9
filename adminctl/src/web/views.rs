//! Named views rendered with minijinja from templates embedded in the binary.

use crate::config::FlashConfig;
use crate::errors::Result;
use crate::web::flash::{self, Flash};
use axum::{
    http::header,
    response::{AppendHeaders, Html, IntoResponse, Response},
};
use minijinja::{Environment, UndefinedBehavior, Value, context};

pub const DASHBOARD_VIEW: &str = "admin/dashboard";
pub const MOCKUP_VIEW: &str = "admin/mockup";
pub const USERS_VIEW: &str = "admin/security/users";
pub const ROLES_VIEW: &str = "admin/security/roles";
pub const USERFORM_VIEW: &str = "admin/security/userform";

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../../templates/layout.html")),
    ("admin/dashboard.html", include_str!("../../templates/admin/dashboard.html")),
    ("admin/mockup.html", include_str!("../../templates/admin/mockup.html")),
    ("admin/security/users.html", include_str!("../../templates/admin/security/users.html")),
    ("admin/security/roles.html", include_str!("../../templates/admin/security/roles.html")),
    ("admin/security/userform.html", include_str!("../../templates/admin/security/userform.html")),
];

pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> std::result::Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        // Pages render with partial models (e.g. no `errors` outside a failed submit)
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Render `view` with `ctx`. The view name is available to templates as `view`.
    pub fn render(&self, view: &str, ctx: Value) -> Result<Page> {
        let template = self.env.get_template(&format!("{view}.html"))?;
        let html = template.render(context! { view => view, ..ctx })?;
        Ok(Page { html, clear_flash: None })
    }
}

/// A rendered page, optionally clearing the flash cookie it displayed.
#[derive(Debug)]
pub struct Page {
    html: String,
    clear_flash: Option<String>,
}

impl Page {
    pub fn consume_flash(mut self, flash: &Flash, config: &FlashConfig) -> Self {
        if flash.is_pending() {
            self.clear_flash = Some(flash::clear_cookie(config));
        }
        self
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        match self.clear_flash {
            Some(cookie) => (AppendHeaders([(header::SET_COOKIE, cookie)]), Html(self.html)).into_response(),
            None => Html(self.html).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_views_render_with_empty_model() {
        let views = Views::new().unwrap();
        for view in [DASHBOARD_VIEW, MOCKUP_VIEW, USERS_VIEW, ROLES_VIEW, USERFORM_VIEW] {
            let page = views.render(view, context! {}).unwrap();
            assert!(page.html.contains(&format!("data-view=\"{view}\"")), "{view} missing marker");
        }
    }

    #[test]
    fn test_feedback_is_escaped() {
        let views = Views::new().unwrap();
        let page = views
            .render(DASHBOARD_VIEW, context! { feedback => "<b>Role</b> added" })
            .unwrap();
        assert!(page.html.contains("&lt;b&gt;Role&lt;/b&gt; added"));
    }

    #[test]
    fn test_unknown_view_is_an_error() {
        let views = Views::new().unwrap();
        assert!(views.render("admin/missing", context! {}).is_err());
    }
}
