use crate::AppState;
use crate::errors::Result;
use crate::web::{
    flash::Flash,
    views::{DASHBOARD_VIEW, MOCKUP_VIEW, Page},
};
use axum::extract::State;
use minijinja::context;

#[tracing::instrument(skip_all)]
pub async fn home(State(state): State<AppState>, flash: Flash) -> Result<Page> {
    let page = state
        .views
        .render(DASHBOARD_VIEW, context! { feedback => flash.message(&state.messages) })?;
    Ok(page.consume_flash(&flash, &state.config.flash))
}

#[tracing::instrument(skip_all)]
pub async fn mockup(State(state): State<AppState>) -> Result<Page> {
    state.views.render(MOCKUP_VIEW, context! {})
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{InMemoryUserService, create_test_app};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_dashboard_and_mockup_render() {
        let server = create_test_app(Arc::new(InMemoryUserService::default()));

        let response = server.get("/admin").await;
        response.assert_status_ok();
        assert!(response.text().contains("data-view=\"admin/dashboard\""));

        let response = server.get("/admin/mockup").await;
        response.assert_status_ok();
        assert!(response.text().contains("data-view=\"admin/mockup\""));
    }
}
