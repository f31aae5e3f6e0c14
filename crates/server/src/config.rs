//! Configuration loading and validation for the service.
//!
//! All values are read from environment variables at startup (an optional
//! `.env` file is merged into the environment first). The process will exit
//! with a clear error message if any required variable is missing or invalid.

use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::lifecycle::ServiceEndpoint;

/// Log levels accepted in `LOG_LEVEL`.
pub const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Highest Redis logical database index accepted in `REDIS_DB`.
pub const REDIS_DB_MAX: u8 = 15;

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Port the primary (application) listener binds to.
    #[serde(default = "default_app_port")]
    pub app_port: u16,

    /// Address the primary listener binds to.
    #[serde(default = "default_bind_address")]
    pub app_bind_address: String,

    /// PEM-encoded RSA public key with `||` in place of newlines. **Required.**
    pub jwt_public_key: String,

    /// Tracing log level, one of [`LOG_LEVELS`]. **Required.**
    pub log_level: String,

    /// Release version reported at startup and in `svc_build_info`.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Commit the binary was built from.
    #[serde(default = "default_git_commit_sha")]
    pub git_commit_sha: String,

    /// Data-store connection string. **Required.**
    pub database_url: String,

    /// Port the metrics listener binds to.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Address the metrics listener binds to.
    #[serde(default = "default_bind_address")]
    pub metrics_bind_address: String,

    /// Whether the metrics listener is started at all.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Redis host. **Required.**
    pub redis_host: String,

    /// Redis port. **Required.**
    pub redis_port: u16,

    /// Redis logical database, `0..=15`. **Required.**
    pub redis_db: u8,

    #[serde(default)]
    pub redis_username: String,

    #[serde(default)]
    pub redis_password: String,

    #[serde(default = "default_redis_tls_enabled")]
    pub redis_tls_enabled: bool,

    #[serde(default)]
    pub redis_command_timeout: u64,

    #[serde(default)]
    pub redis_connect_timeout: u64,

    /// OTLP/gRPC endpoint for span export. Export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_app_port() -> u16 {
    3000
}
fn default_metrics_port() -> u16 {
    2112
}
fn default_bind_address() -> String {
    "0.0.0.0".into()
}
fn default_app_version() -> String {
    "VERSION_NOT_SET".into()
}
fn default_git_commit_sha() -> String {
    "COMMIT_SHA_NOT_SET".into()
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_redis_tls_enabled() -> bool {
    true
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    /// Whether it was found is returned alongside the config so the caller can
    /// report it once logging is up.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<(Self, bool)> {
        let dotenv_loaded = dotenv::dotenv().is_ok();
        let cfg = Self::from_source(config::Environment::default())?;
        Ok((cfg, dotenv_loaded))
    }

    /// Load and validate configuration from an arbitrary environment source.
    fn from_source(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.jwt_public_key, "JWT_PUBLIC_KEY")?;
        ensure_non_empty(&self.database_url, "DATABASE_URL")?;
        ensure_non_empty(&self.redis_host, "REDIS_HOST")?;
        ensure_non_empty(&self.app_bind_address, "APP_BIND_ADDRESS")?;
        ensure_non_empty(&self.metrics_bind_address, "METRICS_BIND_ADDRESS")?;

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            anyhow::bail!(
                "LOG_LEVEL value {:?} is not one of {:?}",
                self.log_level,
                LOG_LEVELS
            );
        }
        if self.redis_db > REDIS_DB_MAX {
            anyhow::bail!(
                "REDIS_DB value {} is not in range 0-{REDIS_DB_MAX}",
                self.redis_db
            );
        }
        Ok(())
    }

    /// Endpoint of the primary, token-gated listener.
    pub fn primary_endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(self.app_bind_address.clone(), self.app_port, true)
    }

    /// Endpoint of the telemetry listener.
    pub fn metrics_endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(
            self.metrics_bind_address.clone(),
            self.metrics_port,
            self.metrics_enabled,
        )
    }
}

impl fmt::Debug for Config {
    // Credentials are replaced so the config can be logged at startup.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_port", &self.app_port)
            .field("app_bind_address", &self.app_bind_address)
            .field("jwt_public_key_len", &self.jwt_public_key.len())
            .field("log_level", &self.log_level)
            .field("app_version", &self.app_version)
            .field("git_commit_sha", &self.git_commit_sha)
            .field("database_url", &redact(&self.database_url))
            .field("metrics_port", &self.metrics_port)
            .field("metrics_bind_address", &self.metrics_bind_address)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("redis_db", &self.redis_db)
            .field("redis_username", &self.redis_username)
            .field("redis_password", &redact(&self.redis_password))
            .field("redis_tls_enabled", &self.redis_tls_enabled)
            .field("redis_command_timeout", &self.redis_command_timeout)
            .field("redis_connect_timeout", &self.redis_connect_timeout)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
