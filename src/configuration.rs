use std::convert::TryFrom;

use serde::Deserialize;

use crate::error::{AppError, ConfigError};

/// Minimum acceptable length of the HMAC signing secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Secret used when a development deployment has no usable secret configured.
pub const DEVELOPMENT_SECRET: &str = "super-dev-secret-key-change-this-before-production-2026";

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    #[serde(default)]
    pub jwt: JwtSettings,
    #[serde(default)]
    pub refresh_tokens: RefreshTokenSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT issuance settings
#[derive(Deserialize, Clone)]
pub struct JwtSettings {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            issuer: default_issuer(),
            audience: default_audience(),
            access_token_minutes: default_access_token_minutes(),
            refresh_token_days: default_refresh_token_days(),
        }
    }
}

// The secret never reaches the logs.
impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret_key", &"[redacted]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish()
    }
}

impl JwtSettings {
    /// Resolve the secret used to sign and verify access tokens.
    ///
    /// A missing or short secret is replaced by [`DEVELOPMENT_SECRET`] in
    /// development (with a warning) and refused in production.
    pub fn signing_secret(&self, environment: Environment) -> Result<String, AppError> {
        let configured = self.secret_key.trim();
        if configured.len() >= MIN_SECRET_LENGTH {
            return Ok(configured.to_string());
        }

        match environment {
            Environment::Production => {
                tracing::error!("JWT secret is missing or shorter than {} bytes", MIN_SECRET_LENGTH);
                Err(ConfigError::WeakSigningSecret(MIN_SECRET_LENGTH).into())
            }
            Environment::Development => {
                tracing::warn!(
                    "JWT secret is missing or shorter than {} bytes; using the built-in development secret",
                    MIN_SECRET_LENGTH
                );
                Ok(DEVELOPMENT_SECRET.to_string())
            }
        }
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_minutes)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_days)
    }
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefreshTokenBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct RefreshTokenSettings {
    #[serde(default)]
    pub backend: RefreshTokenBackend,
    /// Seconds between sweeps of revoked and expired entries. No sweep when unset.
    #[serde(default)]
    pub sweep_interval_seconds: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    /// Read `APP_ENVIRONMENT`, defaulting to development.
    pub fn current() -> Result<Self, AppError> {
        std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "development".into())
            .try_into()
    }
}

impl TryFrom<String> for Environment {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "development" | "local" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string()).into()),
        }
    }
}

/// Load settings from `configuration/base`, then `configuration/{environment}`,
/// then `APP_`-prefixed environment variables (`APP_JWT__SECRET_KEY=...`).
pub fn get_configuration(environment: Environment) -> Result<Settings, AppError> {
    let base_path = std::env::current_dir()
        .map_err(|e| ConfigError::Load(format!("Failed to determine the current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base")).required(false))
        .add_source(
            config::File::from(configuration_directory.join(environment.as_str())).required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<Settings>()?)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_max_connections() -> u32 {
    5
}

fn default_issuer() -> String {
    "HospitalAPI".to_string()
}

fn default_audience() -> String {
    "HospitalAPI.Client".to_string()
}

fn default_access_token_minutes() -> i64 {
    60
}

fn default_refresh_token_days() -> i64 {
    7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_defaults() {
        let settings = JwtSettings::default();
        assert_eq!(settings.issuer, "HospitalAPI");
        assert_eq!(settings.audience, "HospitalAPI.Client");
        assert_eq!(settings.access_token_ttl(), chrono::Duration::minutes(60));
        assert_eq!(settings.refresh_token_ttl(), chrono::Duration::days(7));
    }

    #[test]
    fn test_strong_secret_is_used_as_is() {
        let settings = JwtSettings {
            secret_key: "a-production-grade-secret-of-44-characters".to_string(),
            ..JwtSettings::default()
        };

        let secret = settings.signing_secret(Environment::Production).unwrap();
        assert_eq!(secret, "a-production-grade-secret-of-44-characters");
    }

    #[test]
    fn test_short_secret_falls_back_in_development() {
        let settings = JwtSettings {
            secret_key: "short".to_string(),
            ..JwtSettings::default()
        };

        let secret = settings.signing_secret(Environment::Development).unwrap();
        assert_eq!(secret, DEVELOPMENT_SECRET);
    }

    #[test]
    fn test_short_secret_is_fatal_in_production() {
        let settings = JwtSettings::default();
        let result = settings.signing_secret(Environment::Production);
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::WeakSigningSecret(MIN_SECRET_LENGTH)))
        ));
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::try_from("Production".to_string()).unwrap(),
            Environment::Production
        );
        assert_eq!(
            Environment::try_from("local".to_string()).unwrap(),
            Environment::Development
        );
        assert!(Environment::try_from("staging".to_string()).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let settings = JwtSettings {
            secret_key: "do-not-print-this-secret-anywhere-please".to_string(),
            ..JwtSettings::default()
        };
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("do-not-print"));
    }
}
