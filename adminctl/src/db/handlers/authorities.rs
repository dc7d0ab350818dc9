//! Database repository for authorities (roles).

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::authorities::{AuthorityCreateDBRequest, AuthorityDBResponse, AuthorityUpdateDBRequest},
};
use crate::types::{AuthorityId, Operation};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

/// Filter for listing authorities
#[derive(Debug, Clone)]
pub struct AuthorityFilter {
    pub skip: i64,
    pub limit: i64,
}

impl Default for AuthorityFilter {
    fn default() -> Self {
        Self { skip: 0, limit: i64::MAX }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
struct Authority {
    pub id: AuthorityId,
    pub authority: String,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Authority> for AuthorityDBResponse {
    fn from(authority: Authority) -> Self {
        Self {
            id: authority.id,
            authority: authority.authority,
            is_locked: authority.is_locked,
        }
    }
}

pub struct Authorities<'c> {
    db: &'c mut PgConnection,
}

/// The error for a mutation refused because the authority is locked.
pub fn locked(operation: Operation, id: AuthorityId) -> DbError {
    DbError::ProtectedEntity {
        operation,
        reason: "authority is locked".to_string(),
        entity_type: "Authority".to_string(),
        entity_id: Some(id.to_string()),
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Authorities<'c> {
    type CreateRequest = AuthorityCreateDBRequest;
    type UpdateRequest = AuthorityUpdateDBRequest;
    type Response = AuthorityDBResponse;
    type Id = AuthorityId;
    type Filter = AuthorityFilter;

    #[instrument(skip(self, request), fields(authority = %request.authority), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let authority = sqlx::query_as::<_, Authority>(
            r#"
            INSERT INTO authorities (authority, is_locked)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&request.authority)
        .bind(request.is_locked)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(AuthorityDBResponse::from(authority))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let authority = sqlx::query_as::<_, Authority>("SELECT * FROM authorities WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(authority.map(AuthorityDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let authorities = sqlx::query_as::<_, Authority>("SELECT * FROM authorities ORDER BY id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(authorities.into_iter().map(AuthorityDBResponse::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM authorities WHERE id = $1 AND NOT is_locked")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Nothing deleted: either it does not exist, or it is locked
        match self.get_by_id(id).await? {
            Some(existing) if existing.is_locked => Err(locked(Operation::Delete, id)),
            _ => Ok(false),
        }
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let authority = sqlx::query_as::<_, Authority>(
            r#"
            UPDATE authorities SET
                authority = COALESCE($2, authority),
                is_locked = COALESCE($3, is_locked),
                updated_at = NOW()
            WHERE id = $1 AND NOT is_locked
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.authority.as_deref())
        .bind(request.is_locked)
        .fetch_optional(&mut *self.db)
        .await?;

        match authority {
            Some(authority) => Ok(AuthorityDBResponse::from(authority)),
            None => match self.get_by_id(id).await? {
                Some(_) => Err(locked(Operation::Update, id)),
                None => Err(DbError::NotFound),
            },
        }
    }
}

impl<'c> Authorities<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Fetch an authority and hold a row lock on it until the surrounding transaction ends.
    /// Membership inserts reference the row, so they wait for the lock too.
    #[instrument(skip(self), err)]
    pub async fn get_for_update(&mut self, id: AuthorityId) -> Result<Option<AuthorityDBResponse>> {
        let authority = sqlx::query_as::<_, Authority>("SELECT * FROM authorities WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(authority.map(AuthorityDBResponse::from))
    }

    /// Create the named authority as locked, or lock it if it already exists.
    #[instrument(skip(self), err)]
    pub async fn ensure_locked(&mut self, name: &str) -> Result<AuthorityDBResponse> {
        let authority = sqlx::query_as::<_, Authority>(
            r#"
            INSERT INTO authorities (authority, is_locked)
            VALUES ($1, TRUE)
            ON CONFLICT (authority) DO UPDATE SET is_locked = TRUE, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(name)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(AuthorityDBResponse::from(authority))
    }
}
