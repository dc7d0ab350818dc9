//! Shared helpers for handler tests.

use crate::api::models::{roles::RoleForm, users::UserForm};
use crate::config::Config;
use crate::db::handlers::authorities;
use crate::db::models::{authorities::AuthorityDBResponse, users::UserDBResponse};
use crate::errors::{Error, Result};
use crate::service::UserService;
use crate::types::{AuthorityId, Operation, UserId};
use crate::web::views::Views;
use crate::{AppState, build_router};
use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use std::sync::{Arc, Mutex};

/// A state-changing call received by [`InMemoryUserService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateUser(String),
    UpdateUser(UserId),
    CreateAuthority(String),
    UpdateAuthority(AuthorityId),
    DeleteAuthority { id: AuthorityId, detached: usize },
}

#[derive(Default)]
struct Store {
    next_id: i64,
    users: Vec<UserDBResponse>,
    authorities: Vec<AuthorityDBResponse>,
    mutations: Vec<Mutation>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn resolve(&self, ids: &[AuthorityId]) -> Vec<AuthorityDBResponse> {
        self.authorities.iter().filter(|a| ids.contains(&a.id)).cloned().collect()
    }

    fn ensure_unlocked(&self, operation: Operation, id: AuthorityId) -> Result<()> {
        if self.authorities.iter().any(|a| a.id == id && a.is_locked) {
            return Err(authorities::locked(operation, id).into());
        }
        Ok(())
    }
}

type Hook = Box<dyn FnOnce(&InMemoryUserService) + Send>;

/// [`UserService`] test double that keeps everything in memory and records mutations.
///
/// Users and authorities share one id sequence starting at 1. Passwords are stored
/// unhashed in `password_hash`.
#[derive(Default)]
pub struct InMemoryUserService {
    store: Mutex<Store>,
    on_member_lookup: Mutex<Option<Hook>>,
}

impl InMemoryUserService {
    /// Seed an authority without recording a mutation.
    pub fn add_authority(&self, name: &str, is_locked: bool) -> AuthorityDBResponse {
        let mut store = self.store.lock().unwrap();
        let authority = AuthorityDBResponse {
            id: store.next_id(),
            authority: name.to_string(),
            is_locked,
        };
        store.authorities.push(authority.clone());
        authority
    }

    /// Seed a user without recording a mutation.
    pub fn add_user(&self, username: &str, authority_ids: &[AuthorityId]) -> UserDBResponse {
        let mut store = self.store.lock().unwrap();
        let user = UserDBResponse {
            id: store.next_id(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            first_name: username.to_string(),
            last_name: "Test".to_string(),
            password_hash: "seeded".to_string(),
            sign_in_provider: Default::default(),
            enabled: true,
            authorities: store.resolve(authority_ids),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.users.push(user.clone());
        user
    }

    /// Lock or unlock an authority without recording a mutation.
    pub fn set_locked(&self, id: AuthorityId, is_locked: bool) {
        let mut store = self.store.lock().unwrap();
        for authority in store.authorities.iter_mut().filter(|a| a.id == id) {
            authority.is_locked = is_locked;
        }
        for user in store.users.iter_mut() {
            for authority in user.authorities.iter_mut().filter(|a| a.id == id) {
                authority.is_locked = is_locked;
            }
        }
    }

    /// Run `hook` once, right after the next `get_users_by_authority_id` has produced its
    /// answer. Simulates another request changing the store between a handler's reads and
    /// its write.
    pub fn on_member_lookup(&self, hook: impl FnOnce(&InMemoryUserService) + Send + 'static) {
        *self.on_member_lookup.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn users(&self) -> Vec<UserDBResponse> {
        self.store.lock().unwrap().users.clone()
    }

    pub fn user(&self, id: UserId) -> Option<UserDBResponse> {
        self.store.lock().unwrap().users.iter().find(|u| u.id == id).cloned()
    }

    pub fn roles(&self) -> Vec<AuthorityDBResponse> {
        self.store.lock().unwrap().authorities.clone()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.store.lock().unwrap().mutations.clone()
    }
}

#[async_trait::async_trait]
impl UserService for InMemoryUserService {
    async fn get_all_users(&self) -> Result<Vec<UserDBResponse>> {
        Ok(self.users())
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.user(id))
    }

    async fn get_roles(&self) -> Result<Vec<AuthorityDBResponse>> {
        Ok(self.roles())
    }

    async fn create(&self, user: &UserForm) -> Result<UserDBResponse> {
        let password = user.password.clone().ok_or_else(|| Error::BadRequest {
            message: "A password is required to create a user".to_string(),
        })?;

        let mut store = self.store.lock().unwrap();
        let created = UserDBResponse {
            id: store.next_id(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            password_hash: password,
            sign_in_provider: user.sign_in_provider,
            enabled: true,
            authorities: store.resolve(&user.authorities),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.users.push(created.clone());
        store.mutations.push(Mutation::CreateUser(user.username.clone()));
        Ok(created)
    }

    async fn update(&self, user: &UserForm) -> Result<UserDBResponse> {
        let id = user.user_id.ok_or_else(|| Error::BadRequest {
            message: "Cannot update a user without an id".to_string(),
        })?;

        let mut store = self.store.lock().unwrap();
        let authorities = store.resolve(&user.authorities);
        let existing = store.users.iter_mut().find(|u| u.id == id).ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        })?;

        existing.username = user.username.clone();
        existing.email = user.email.clone();
        existing.first_name = user.first_name.clone();
        existing.last_name = user.last_name.clone();
        existing.sign_in_provider = user.sign_in_provider;
        if user.update_children {
            existing.authorities = authorities;
        }
        let updated = existing.clone();
        store.mutations.push(Mutation::UpdateUser(id));
        Ok(updated)
    }

    async fn get_authority_by_id(&self, id: AuthorityId) -> Result<Option<AuthorityDBResponse>> {
        Ok(self.roles().into_iter().find(|a| a.id == id))
    }

    async fn create_authority(&self, role: &RoleForm) -> Result<AuthorityDBResponse> {
        let mut store = self.store.lock().unwrap();
        let authority = AuthorityDBResponse {
            id: store.next_id(),
            authority: role.authority.clone(),
            is_locked: role.is_locked,
        };
        store.authorities.push(authority.clone());
        store.mutations.push(Mutation::CreateAuthority(role.authority.clone()));
        Ok(authority)
    }

    async fn update_authority(&self, role: &RoleForm) -> Result<AuthorityDBResponse> {
        let id = role.id.ok_or_else(|| Error::BadRequest {
            message: "Cannot update a role without an id".to_string(),
        })?;

        let mut store = self.store.lock().unwrap();
        store.ensure_unlocked(Operation::Update, id)?;
        let existing = store.authorities.iter_mut().find(|a| a.id == id).ok_or_else(|| Error::NotFound {
            resource: "Authority".to_string(),
            id: id.to_string(),
        })?;
        existing.authority = role.authority.clone();
        existing.is_locked = role.is_locked;
        let updated = existing.clone();
        store.mutations.push(Mutation::UpdateAuthority(id));
        Ok(updated)
    }

    async fn get_users_by_authority_id(&self, id: AuthorityId) -> Result<Vec<UserDBResponse>> {
        let members: Vec<UserDBResponse> = self
            .users()
            .into_iter()
            .filter(|u| u.authorities.iter().any(|a| a.id == id))
            .collect();

        let hook = self.on_member_lookup.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(self);
        }
        Ok(members)
    }

    async fn delete_authority(&self, authority: &AuthorityDBResponse, _users: &[UserDBResponse]) -> Result<usize> {
        let mut store = self.store.lock().unwrap();
        store.ensure_unlocked(Operation::Delete, authority.id)?;

        let mut detached = 0;
        for member in store.users.iter_mut() {
            let before = member.authorities.len();
            member.authorities.retain(|a| a.id != authority.id);
            if member.authorities.len() != before {
                detached += 1;
            }
        }
        store.authorities.retain(|a| a.id != authority.id);
        store.mutations.push(Mutation::DeleteAuthority {
            id: authority.id,
            detached,
        });
        Ok(detached)
    }
}

pub fn create_test_config() -> Config {
    Config::default()
}

pub fn create_test_app(service: Arc<InMemoryUserService>) -> TestServer {
    let state = AppState::builder()
        .users(service as Arc<dyn UserService>)
        .config(create_test_config())
        .views(Arc::new(Views::new().expect("Failed to load templates")))
        .build();

    TestServer::new(build_router(state)).expect("Failed to create test server")
}

/// Value of the flash cookie set by `response`, if any.
pub fn flash_cookie(response: &TestResponse) -> Option<String> {
    let name = format!("{}=", create_test_config().flash.cookie_name);
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| cookie.strip_prefix(name.as_str()))
        .and_then(|rest| rest.split(';').next())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
