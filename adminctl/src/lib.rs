//! # adminctl: admin pages for user and role management
//!
//! `adminctl` serves server-rendered admin pages under `/admin` for managing user accounts
//! and the authorities (roles) granted to them.
//!
//! ## Request flow
//!
//! Every handler in [`api::handlers`] does one of four things: fetch users or roles through
//! the [`UserService`], bind and validate a submitted form, delegate a mutation to the
//! service, or render a named view / redirect with a feedback message. Handlers never touch
//! the database directly; the binary wires in [`service::PgUserService`], and tests use an
//! in-memory implementation.
//!
//! Forms are posted as `application/x-www-form-urlencoded`. A form with validation errors
//! is rendered again with the errors and nothing is changed. Successful mutations redirect
//! (`303 See Other`) and leave a one-shot feedback message in a cookie
//! (see [`web::flash`]), which the next page shows and clears.
//!
//! Roles can be locked. Locked roles are never renamed or deleted from the admin pages;
//! the roles configured as `seed_roles` are created locked at startup.
//!
//! ## Persistence
//!
//! PostgreSQL through sqlx, with the schema in `migrations/` applied at startup. The
//! [`db`] module follows a repository pattern: one repository per table, each borrowing a
//! connection so that callers control transactions.
//!
//! ## Configuration
//!
//! See [`config`]. A YAML file (`-f`, default `config.yaml`) with `ADMINCTL_` environment
//! overrides.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod service;
pub mod telemetry;
#[cfg(test)]
mod test_utils;
pub mod types;
pub mod web;

use crate::api::handlers::{admin, roles, users};
use crate::db::handlers::{Authorities, Repository, Users};
use crate::db::models::{authorities::AuthorityDBResponse, users::UserCreateDBRequest};
use crate::types::{AuthorityId, UserId};
use crate::web::{messages::MessageBundle, views::Views};
use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use service::PgUserService;
pub use service::UserService;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

/// Application state shared across all request handlers.
///
/// # Example
/// ```ignore
/// let state = AppState::builder()
///     .users(Arc::new(PgUserService::new(pool)))
///     .config(config)
///     .views(Arc::new(Views::new()?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub users: Arc<dyn UserService>,
    pub config: Config,
    pub views: Arc<Views>,
    #[builder(default)]
    pub messages: Arc<MessageBundle>,
}

/// Get the adminctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create each named role as a locked authority, locking it if it already exists.
#[instrument(skip(db), err)]
pub async fn seed_roles(names: &[String], db: &PgPool) -> anyhow::Result<Vec<AuthorityDBResponse>> {
    let mut tx = db.begin().await?;
    let mut seeded = Vec::with_capacity(names.len());
    for name in names {
        seeded.push(Authorities::new(&mut tx).ensure_locked(name).await?);
    }
    tx.commit().await?;

    debug!("Seeded {} locked roles", seeded.len());
    Ok(seeded)
}

/// Username for the bootstrap admin: the local part of the email, reduced to the
/// characters and length a username allows.
fn admin_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let username: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .take(15)
        .collect();

    if username.len() < 3 { "admin".to_string() } else { username }
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: an existing account (matched by email) only gets its password reset, and
/// only when one is configured. A new account is granted `authority_ids`.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(
    email: &str,
    password: Option<&str>,
    authority_ids: &[AuthorityId],
    db: &PgPool,
) -> anyhow::Result<UserId> {
    let password_hash = match password {
        Some(password) => Some(auth::password::hash_password(password)?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing_user) = user_repo.get_user_by_email(email).await? {
        if let Some(password_hash) = password_hash {
            user_repo.set_password_hash(existing_user.id, &password_hash).await?;
        }
        tx.commit().await?;
        return Ok(existing_user.id);
    }

    let password_hash = match password_hash {
        Some(hash) => hash,
        None => {
            warn!("No admin_password configured; the admin account gets an unusable random password");
            auth::password::hash_password(&uuid::Uuid::new_v4().to_string())?
        }
    };

    let created = user_repo
        .create(&UserCreateDBRequest {
            username: admin_username(email),
            email: email.to_string(),
            first_name: "Site".to_string(),
            last_name: "Admin".to_string(),
            password_hash,
            sign_in_provider: Default::default(),
            authority_ids: authority_ids.to_vec(),
        })
        .await?;

    tx.commit().await?;
    info!(user_id = created.id, username = %created.username, "Created initial admin user");
    Ok(created.id)
}

/// Connect, migrate and seed the database.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool_settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .min_connections(pool_settings.min_connections)
        .acquire_timeout(pool_settings.acquire_timeout())
        .idle_timeout(pool_settings.idle_timeout())
        .max_lifetime(pool_settings.max_lifetime())
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    let seeded = seed_roles(&config.seed_roles, &pool).await?;
    let seeded_ids: Vec<AuthorityId> = seeded.iter().map(|a| a.id).collect();

    create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &seeded_ids, &pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

    Ok(pool)
}

/// Build the application router: the admin pages nested under `/admin`.
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/", get(admin::home))
        .route("/mockup", get(admin::mockup))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/new", get(users::new_user_form).post(users::add_user))
        .route("/users/update/{id}", get(users::edit_user_form).post(users::update_user))
        // Roles
        .route("/roles", get(roles::list_roles))
        .route("/roles/new", post(roles::create_role))
        .route("/roles/update/{id}", post(roles::update_or_delete_role));

    Router::new()
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(bind_address = %config.bind_address(), seed_roles = ?config.seed_roles, "Starting adminctl");

        let pool = setup_database(&config).await?;
        let views = Views::new().map_err(|e| anyhow::anyhow!("Failed to load templates: {}", e))?;

        let state = AppState::builder()
            .users(Arc::new(PgUserService::new(pool.clone())))
            .config(config.clone())
            .views(Arc::new(views))
            .build();

        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "adminctl listening on http://{}, admin pages at http://localhost:{}/admin",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
