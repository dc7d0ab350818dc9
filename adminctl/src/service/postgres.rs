//! [`UserService`] over PostgreSQL, one transaction per operation.

use super::UserService;
use crate::api::models::{roles::RoleForm, users::UserForm};
use crate::auth::password::{self, Argon2Params};
use crate::db::{
    errors::DbError,
    handlers::{
        Authorities, Repository, Users,
        authorities::{self, AuthorityFilter},
        users::UserFilter,
    },
    models::{
        authorities::{AuthorityCreateDBRequest, AuthorityDBResponse, AuthorityUpdateDBRequest},
        users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use crate::errors::{Error, Result};
use crate::types::{AuthorityId, Operation, UserId};
use sqlx::PgPool;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct PgUserService {
    db: PgPool,
    argon2_params: Option<Argon2Params>,
}

impl PgUserService {
    pub fn new(db: PgPool) -> Self {
        Self { db, argon2_params: None }
    }

    pub fn with_argon2_params(mut self, params: Argon2Params) -> Self {
        self.argon2_params = Some(params);
        self
    }

    async fn hash(&self, password: String) -> Result<String> {
        let params = self.argon2_params;
        tokio::task::spawn_blocking(move || password::hash_password_with_params(&password, params))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password hashing task: {e}"),
            })?
    }
}

#[async_trait::async_trait]
impl UserService for PgUserService {
    #[instrument(skip(self), err)]
    async fn get_all_users(&self) -> Result<Vec<UserDBResponse>> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        Ok(Users::new(&mut conn).list(&UserFilter::default()).await?)
    }

    #[instrument(skip(self), err)]
    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        Ok(Users::new(&mut conn).get_by_id(id).await?)
    }

    #[instrument(skip(self), err)]
    async fn get_roles(&self) -> Result<Vec<AuthorityDBResponse>> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        Ok(Authorities::new(&mut conn).list(&AuthorityFilter::default()).await?)
    }

    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn create(&self, user: &UserForm) -> Result<UserDBResponse> {
        let password = user.password.clone().ok_or_else(|| Error::BadRequest {
            message: "A password is required to create a user".to_string(),
        })?;
        let password_hash = self.hash(password).await?;

        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let created = Users::new(&mut tx).create(&UserCreateDBRequest::new(user, password_hash)).await?;
        tx.commit().await.map_err(DbError::from)?;

        Ok(created)
    }

    #[instrument(skip(self, user), fields(user_id = ?user.user_id), err)]
    async fn update(&self, user: &UserForm) -> Result<UserDBResponse> {
        let id = user.user_id.ok_or_else(|| Error::BadRequest {
            message: "Cannot update a user without an id".to_string(),
        })?;

        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let updated = Users::new(&mut tx).update(id, &UserUpdateDBRequest::from(user)).await?;
        tx.commit().await.map_err(DbError::from)?;

        Ok(updated)
    }

    #[instrument(skip(self), err)]
    async fn get_authority_by_id(&self, id: AuthorityId) -> Result<Option<AuthorityDBResponse>> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        Ok(Authorities::new(&mut conn).get_by_id(id).await?)
    }

    #[instrument(skip(self, role), fields(authority = %role.authority), err)]
    async fn create_authority(&self, role: &RoleForm) -> Result<AuthorityDBResponse> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        Ok(Authorities::new(&mut conn).create(&AuthorityCreateDBRequest::from(role)).await?)
    }

    #[instrument(skip(self, role), fields(authority_id = ?role.id), err)]
    async fn update_authority(&self, role: &RoleForm) -> Result<AuthorityDBResponse> {
        let id = role.id.ok_or_else(|| Error::BadRequest {
            message: "Cannot update a role without an id".to_string(),
        })?;

        let mut tx = self.db.begin().await.map_err(DbError::from)?;
        let updated = Authorities::new(&mut tx).update(id, &AuthorityUpdateDBRequest::from(role)).await?;
        tx.commit().await.map_err(DbError::from)?;

        Ok(updated)
    }

    #[instrument(skip(self), err)]
    async fn get_users_by_authority_id(&self, id: AuthorityId) -> Result<Vec<UserDBResponse>> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        Ok(Users::new(&mut conn).list_by_authority(id).await?)
    }

    #[instrument(skip(self, authority, users), fields(authority_id = authority.id, members = users.len()), err)]
    async fn delete_authority(&self, authority: &AuthorityDBResponse, users: &[UserDBResponse]) -> Result<usize> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        let current = Authorities::new(&mut tx)
            .get_for_update(authority.id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Authority".to_string(),
                id: authority.id.to_string(),
            })?;
        if current.is_locked {
            return Err(authorities::locked(Operation::Delete, authority.id).into());
        }

        // Membership is stable while the row lock is held
        let members = Users::new(&mut tx).list_by_authority(authority.id).await?;
        if members.len() != users.len() {
            debug!(expected = users.len(), found = members.len(), "Authority membership changed before delete");
        }
        for member in &members {
            let removed = Users::new(&mut tx).remove_authority(member.id, authority.id).await?;
            debug!(user_id = member.id, removed, "Detached user from authority");
        }

        Authorities::new(&mut tx).delete(authority.id).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(members.len())
    }
}
