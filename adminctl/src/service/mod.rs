//! The user/role service the admin pages delegate to.
//!
//! Handlers only ever talk to [`UserService`]; [`postgres::PgUserService`] is the adapter used
//! by the binary, and tests swap in an in-memory implementation.

pub mod postgres;

use crate::api::models::{roles::RoleForm, users::UserForm};
use crate::db::models::{authorities::AuthorityDBResponse, users::UserDBResponse};
use crate::errors::Result;
use crate::types::{AuthorityId, UserId};

pub use postgres::PgUserService;

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn get_all_users(&self) -> Result<Vec<UserDBResponse>>;

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Every authority, in id order
    async fn get_roles(&self) -> Result<Vec<AuthorityDBResponse>>;

    /// Create a user with the form's authorities. The form must carry a password.
    async fn create(&self, user: &UserForm) -> Result<UserDBResponse>;

    /// Update the user named by `user.user_id`. Memberships are replaced only when
    /// `update_children` is set.
    async fn update(&self, user: &UserForm) -> Result<UserDBResponse>;

    async fn get_authority_by_id(&self, id: AuthorityId) -> Result<Option<AuthorityDBResponse>>;

    async fn create_authority(&self, role: &RoleForm) -> Result<AuthorityDBResponse>;

    async fn update_authority(&self, role: &RoleForm) -> Result<AuthorityDBResponse>;

    async fn get_users_by_authority_id(&self, id: AuthorityId) -> Result<Vec<UserDBResponse>>;

    /// Detach `authority` from its members, then delete it. `users` is the membership the
    /// caller looked up; members that joined since are detached too. Returns how many users
    /// were detached. Fails with `DbError::ProtectedEntity` if the authority is locked by now.
    async fn delete_authority(&self, authority: &AuthorityDBResponse, users: &[UserDBResponse]) -> Result<usize>;
}
