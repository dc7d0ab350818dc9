use crate::AppState;
use crate::api::models::{
    forms::{BindingResult, FieldErrors, FormFields},
    roles::AuthorityResponse,
    users::{SignInProvider, UserForm, UserListQuery, UserResponse},
};
use crate::errors::Result;
use crate::types::{NEW_ENTITY_ID, UserId};
use crate::web::{
    flash::{Feedback, Flash, redirect_with_feedback},
    messages::{USER_ADDED, USER_UPDATED},
    views::{Page, USERFORM_VIEW, USERS_VIEW},
};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use minijinja::context;
use tracing::{debug, info};
use uuid::Uuid;

#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, Query(query): Query<UserListQuery>, flash: Flash) -> Result<Page> {
    let users: Vec<UserResponse> = state
        .users
        .get_all_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    let page = state.views.render(
        USERS_VIEW,
        context! {
            users,
            highlight => query.id,
            feedback => flash.message(&state.messages),
        },
    )?;
    Ok(page.consume_flash(&flash, &state.config.flash))
}

#[tracing::instrument(skip_all, fields(user_id = id))]
pub async fn edit_user_form(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<Page> {
    populate_user_form(&state, id).await
}

#[tracing::instrument(skip_all)]
pub async fn new_user_form(State(state): State<AppState>) -> Result<Page> {
    populate_user_form(&state, NEW_ENTITY_ID).await
}

/// The user form for `id`, or a blank form when no such user exists.
async fn populate_user_form(state: &AppState, id: UserId) -> Result<Page> {
    let user = match state.users.get_user_by_id(id).await? {
        Some(found) => {
            info!("Editing user with id and username: {} {}", id, found.username);
            UserForm::from(&found)
        }
        None => UserForm::default(),
    };

    render_user_form(state, &user, &FieldErrors::default()).await
}

async fn render_user_form(state: &AppState, user: &UserForm, errors: &FieldErrors) -> Result<Page> {
    let authorities: Vec<AuthorityResponse> = state
        .users
        .get_roles()
        .await?
        .into_iter()
        .map(AuthorityResponse::from)
        .collect();

    state.views.render(USERFORM_VIEW, context! { user, authorities, errors })
}

#[tracing::instrument(skip_all, fields(user_id = id))]
pub async fn update_user(State(state): State<AppState>, Path(id): Path<UserId>, fields: FormFields) -> Result<Response> {
    let BindingResult { mut form, errors } = UserForm::bind(&fields);
    // The path names the user being edited, whatever the body says
    form.user_id = Some(id);

    if !errors.is_empty() {
        debug!("User form has errors in: {:?}", errors.fields().collect::<Vec<_>>());
        return Ok(render_user_form(&state, &form, &errors).await?.into_response());
    }

    form.update_children = true;
    state.users.update(&form).await?;

    let feedback = Feedback::new(USER_UPDATED).arg(&form.first_name).arg(&form.last_name);
    redirect_with_feedback(&format!("/admin/users?id={id}"), feedback, &state.config.flash)
}

#[tracing::instrument(skip_all)]
pub async fn add_user(State(state): State<AppState>, fields: FormFields) -> Result<Response> {
    let BindingResult { mut form, errors } = UserForm::bind(&fields);

    if !errors.is_empty() {
        debug!("User form has errors in: {:?}", errors.fields().collect::<Vec<_>>());
        return Ok(render_user_form(&state, &form, &errors).await?.into_response());
    }

    form.password = Some(Uuid::new_v4().to_string());
    form.sign_in_provider = SignInProvider::Site;
    let added = state.users.create(&form).await?;
    info!(
        user_id = added.id,
        username = %added.username,
        email = %added.email,
        authorities = added.authorities.len(),
        "Added user"
    );

    let feedback = Feedback::new(USER_ADDED).arg(&added.first_name).arg(&added.last_name);
    redirect_with_feedback("/admin/users", feedback, &state.config.flash)
}
