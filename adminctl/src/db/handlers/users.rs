//! Database repository for users and their authority memberships.

use crate::api::models::users::SignInProvider;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        authorities::AuthorityDBResponse,
        users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use crate::types::{AuthorityId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self { skip: 0, limit: i64::MAX }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub sign_in_provider: SignInProvider,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct MemberAuthority {
    pub id: AuthorityId,
    pub authority: String,
    pub is_locked: bool,
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl From<(Vec<AuthorityDBResponse>, User)> for UserDBResponse {
    fn from((authorities, user): (Vec<AuthorityDBResponse>, User)) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            sign_in_provider: user.sign_in_provider,
            enabled: user.enabled,
            authorities,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

async fn load_authorities(conn: &mut PgConnection, user_id: UserId) -> Result<Vec<AuthorityDBResponse>> {
    let authorities = sqlx::query_as::<_, MemberAuthority>(
        r#"
        SELECT a.id, a.authority, a.is_locked
        FROM authorities a
        JOIN user_authorities ua ON ua.authority_id = a.id
        WHERE ua.user_id = $1
        ORDER BY a.id
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    Ok(authorities
        .into_iter()
        .map(|a| AuthorityDBResponse {
            id: a.id,
            authority: a.authority,
            is_locked: a.is_locked,
        })
        .collect())
}

async fn insert_memberships(conn: &mut PgConnection, user_id: UserId, authority_ids: &[AuthorityId]) -> Result<()> {
    for authority_id in authority_ids {
        sqlx::query("INSERT INTO user_authorities (user_id, authority_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(authority_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, first_name, last_name, password_hash, sign_in_provider)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.password_hash)
        .bind(request.sign_in_provider)
        .fetch_one(&mut *tx)
        .await?;

        insert_memberships(&mut *tx, user.id, &request.authority_ids).await?;
        let authorities = load_authorities(&mut *tx, user.id).await?;

        tx.commit().await?;

        Ok(UserDBResponse::from((authorities, user)))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match user {
            Some(user) => {
                let authorities = load_authorities(&mut *self.db, id).await?;
                Ok(Some(UserDBResponse::from((authorities, user))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        let mut result = Vec::with_capacity(users.len());
        for user in users {
            let authorities = load_authorities(&mut *self.db, user.id).await?;
            result.push(UserDBResponse::from((authorities, user)));
        }
        Ok(result)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Touches users and user_authorities, so always run in a (nested) transaction
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                sign_in_provider = COALESCE($6, sign_in_provider),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.username.as_deref())
        .bind(request.email.as_deref())
        .bind(request.first_name.as_deref())
        .bind(request.last_name.as_deref())
        .bind(request.sign_in_provider)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(authority_ids) = &request.authority_ids {
            sqlx::query("DELETE FROM user_authorities WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_memberships(&mut *tx, id, authority_ids).await?;
        }

        let authorities = load_authorities(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(UserDBResponse::from((authorities, user)))
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        match user {
            Some(user) => {
                let authorities = load_authorities(&mut *self.db, user.id).await?;
                Ok(Some(UserDBResponse::from((authorities, user))))
            }
            None => Ok(None),
        }
    }

    /// Users holding the given authority
    #[instrument(skip(self), err)]
    pub async fn list_by_authority(&mut self, authority_id: AuthorityId) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN user_authorities ua ON ua.user_id = u.id
            WHERE ua.authority_id = $1
            ORDER BY u.id
            "#,
        )
        .bind(authority_id)
        .fetch_all(&mut *self.db)
        .await?;

        let mut result = Vec::with_capacity(users.len());
        for user in users {
            let authorities = load_authorities(&mut *self.db, user.id).await?;
            result.push(UserDBResponse::from((authorities, user)));
        }
        Ok(result)
    }

    #[instrument(skip(self), err)]
    pub async fn remove_authority(&mut self, user_id: UserId, authority_id: AuthorityId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_authorities WHERE user_id = $1 AND authority_id = $2")
            .bind(user_id)
            .bind(authority_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, password_hash), err)]
    pub async fn set_password_hash(&mut self, user_id: UserId, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}
