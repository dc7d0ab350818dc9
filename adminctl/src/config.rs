//! Configuration: CLI args, YAML file and environment overrides.
//!
//! Values are layered with figment: defaults, then the YAML file named by `-f`, then
//! `ADMINCTL_`-prefixed environment variables (`__` separates nested keys, e.g.
//! `ADMINCTL_FLASH__COOKIE_SECURE=true`), then `DATABASE_URL`.

use crate::api::models::roles::RoleForm;
use crate::errors::Error;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ADMINCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Set from the `DATABASE_URL` environment variable; replaces `database.url` when present
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub database: DatabaseConfig,
    /// Feedback cookie settings
    pub flash: FlashConfig,
    /// Email of the bootstrap admin account, created at startup if missing
    pub admin_email: String,
    /// Password for the bootstrap admin. When set, it is (re)applied at every startup.
    pub admin_password: Option<String>,
    /// Roles created (or locked, if they already exist) at startup. Locked roles cannot be
    /// renamed or deleted from the admin pages.
    pub seed_roles: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: None,
            database: DatabaseConfig::default(),
            flash: FlashConfig::default(),
            admin_email: "admin@example.com".to_string(),
            admin_password: None,
            seed_roles: vec!["ROLE_ADMIN".to_string(), "ROLE_USER".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/adminctl".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool settings passed through to sqlx.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.max_lifetime_secs > 0).then(|| Duration::from_secs(self.max_lifetime_secs))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlashConfig {
    pub cookie_name: String,
    /// Adds the `Secure` attribute; enable when served over HTTPS
    pub cookie_secure: bool,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            cookie_name: "adminctl_flash".to_string(),
            cookie_secure: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let flash = &self.flash;
        if flash.cookie_name.is_empty()
            || !flash.cookie_name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: flash.cookie_name '{}' must be non-empty and contain only letters, digits, '_' or '-'",
                    flash.cookie_name
                ),
            });
        }

        let pool = &self.database.pool;
        if pool.max_connections == 0 {
            return Err(Error::Internal {
                operation: "Config validation: database.pool.max_connections must be at least 1".to_string(),
            });
        }
        if pool.min_connections > pool.max_connections {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: database.pool.min_connections ({}) cannot be greater than max_connections ({})",
                    pool.min_connections, pool.max_connections
                ),
            });
        }

        if !self.admin_email.contains('@') {
            return Err(Error::Internal {
                operation: format!("Config validation: admin_email '{}' is not an email address", self.admin_email),
            });
        }

        for role in &self.seed_roles {
            let form = RoleForm {
                authority: role.clone(),
                ..Default::default()
            };
            if form.validate().is_err() {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: seed role '{role}' must be 3 to 50 characters of letters, digits or '_'"
                    ),
                });
            }
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // ADMINCTL_CONFIG names the file itself, not a config key
            .merge(Env::prefixed("ADMINCTL_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args() -> Args {
        Args {
            config: "test.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 8080\n")?;

            let config = Config::load(&args())?;

            assert_eq!(config.bind_address(), "0.0.0.0:8080");
            assert_eq!(config.flash.cookie_name, "adminctl_flash");
            assert!(!config.flash.cookie_secure);
            assert_eq!(config.seed_roles, vec!["ROLE_ADMIN", "ROLE_USER"]);
            assert_eq!(config.database.pool.idle_timeout(), Some(Duration::from_secs(600)));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
host: 127.0.0.1
database:
  url: postgres://file/db
  pool:
    max_connections: 4
flash:
  cookie_name: from_file
"#,
            )?;

            jail.set_env("ADMINCTL_PORT", "9000");
            jail.set_env("ADMINCTL_FLASH__COOKIE_SECURE", "true");
            jail.set_env("DATABASE_URL", "postgres://env/db");

            let config = Config::load(&args())?;

            assert_eq!(config.bind_address(), "127.0.0.1:9000");
            assert_eq!(config.database.url, "postgres://env/db");
            assert_eq!(config.database.pool.max_connections, 4);
            assert_eq!(config.flash.cookie_name, "from_file");
            assert!(config.flash.cookie_secure);
            assert!(config.database_url.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "hots: 127.0.0.1\n")?;
            assert!(Config::load(&args()).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_validation() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.flash.cookie_name = "bad name".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.pool.min_connections = 20;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.seed_roles.push("x".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.admin_email = "admin".to_string();
        assert!(config.validate().is_err());
    }
}
