use crate::AppState;
use crate::api::models::{
    forms::{BindingResult, FieldErrors, FormFields},
    roles::{AuthorityResponse, RoleActionQuery, RoleForm},
};
use crate::db::{errors::DbError, models::authorities::AuthorityDBResponse};
use crate::errors::{Error, Result};
use crate::types::AuthorityId;
use crate::web::{
    flash::{Feedback, Flash, redirect_with_feedback},
    messages::{ROLE_ADDED, ROLE_DELETED, ROLE_ERROR, ROLE_IS_LOCKED, ROLE_UPDATED},
    views::{Page, ROLES_VIEW},
};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use minijinja::context;
use tracing::{debug, info, warn};

const ROLES_PATH: &str = "/admin/roles";

#[tracing::instrument(skip_all)]
pub async fn list_roles(State(state): State<AppState>, flash: Flash) -> Result<Page> {
    let page = render_roles(&state, &RoleForm::default(), &FieldErrors::default(), flash.message(&state.messages)).await?;
    Ok(page.consume_flash(&flash, &state.config.flash))
}

async fn render_roles(state: &AppState, new_role: &RoleForm, errors: &FieldErrors, feedback: Option<String>) -> Result<Page> {
    let roles: Vec<AuthorityResponse> = state.users.get_roles().await?.into_iter().map(AuthorityResponse::from).collect();

    state.views.render(
        ROLES_VIEW,
        context! {
            roles,
            newRole => new_role,
            errors,
            feedback,
        },
    )
}

#[tracing::instrument(skip_all)]
pub async fn create_role(State(state): State<AppState>, fields: FormFields) -> Result<Response> {
    let BindingResult { mut form, errors } = RoleForm::bind(&fields);
    form.id = None;

    if !errors.is_empty() {
        debug!("Role form has errors in: {:?}", errors.fields().collect::<Vec<_>>());
        return Ok(render_roles(&state, &form, &errors, None).await?.into_response());
    }

    let authority = state.users.create_authority(&form).await?;
    info!(authority_id = authority.id, authority = %authority.authority, is_locked = authority.is_locked, "Role added");

    redirect_with_feedback(ROLES_PATH, Feedback::new(ROLE_ADDED).arg(&authority.authority), &state.config.flash)
}

/// `POST /admin/roles/update/{id}`: a `deleteRole` parameter, in the query string or the
/// body (the delete button), turns the update into a delete.
#[tracing::instrument(skip_all, fields(authority_id = id))]
pub async fn update_or_delete_role(
    State(state): State<AppState>,
    Path(id): Path<AuthorityId>,
    Query(query): Query<RoleActionQuery>,
    fields: FormFields,
) -> Result<Response> {
    if query.delete_role.is_some() || fields.contains("deleteRole") {
        delete_role(&state, id, &fields).await
    } else {
        update_role(&state, id, &fields).await
    }
}

/// Bind the role form and load the authority it targets. `Err(response)` is the redirect to
/// send instead of mutating anything.
async fn load_unlocked_role(
    state: &AppState,
    id: AuthorityId,
    fields: &FormFields,
) -> Result<std::result::Result<(RoleForm, AuthorityDBResponse), Response>> {
    let BindingResult { mut form, errors } = RoleForm::bind(fields);
    if !errors.is_empty() {
        debug!("Role form has errors in: {:?}", errors.fields().collect::<Vec<_>>());
        return Ok(Err(redirect_with_feedback(ROLES_PATH, Feedback::new(ROLE_ERROR), &state.config.flash)?));
    }

    // The path names the role being changed, whatever the body says
    form.id = Some(id);

    let authority = state.users.get_authority_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Authority".to_string(),
        id: id.to_string(),
    })?;

    if authority.is_locked {
        warn!(authority = %authority.authority, "Refusing to change locked role");
        return Ok(Err(redirect_with_feedback(ROLES_PATH, Feedback::new(ROLE_IS_LOCKED), &state.config.flash)?));
    }

    Ok(Ok((form, authority)))
}

/// The role was locked after `load_unlocked_role` looked at it; the storage layer refused.
fn locked_concurrently(state: &AppState) -> Result<Response> {
    warn!("Role was locked while the request was in flight");
    redirect_with_feedback(ROLES_PATH, Feedback::new(ROLE_IS_LOCKED), &state.config.flash)
}

async fn update_role(state: &AppState, id: AuthorityId, fields: &FormFields) -> Result<Response> {
    let form = match load_unlocked_role(state, id, fields).await? {
        Ok((form, _)) => form,
        Err(response) => return Ok(response),
    };

    let updated = match state.users.update_authority(&form).await {
        Ok(updated) => updated,
        Err(Error::Database(DbError::ProtectedEntity { .. })) => return locked_concurrently(state),
        Err(e) => return Err(e),
    };
    info!(authority = %updated.authority, is_locked = updated.is_locked, "Role updated");

    redirect_with_feedback(ROLES_PATH, Feedback::new(ROLE_UPDATED).arg(&form.authority), &state.config.flash)
}

async fn delete_role(state: &AppState, id: AuthorityId, fields: &FormFields) -> Result<Response> {
    let authority = match load_unlocked_role(state, id, fields).await? {
        Ok((_, authority)) => authority,
        Err(response) => return Ok(response),
    };

    let users = state.users.get_users_by_authority_id(id).await?;
    let detached = match state.users.delete_authority(&authority, &users).await {
        Ok(detached) => detached,
        Err(Error::Database(DbError::ProtectedEntity { .. })) => return locked_concurrently(state),
        Err(e) => return Err(e),
    };
    info!(authority = %authority.authority, members = detached, "Role deleted");

    let feedback = Feedback::new(ROLE_DELETED).arg(&authority.authority).arg(detached);
    redirect_with_feedback(ROLES_PATH, feedback, &state.config.flash)
}
