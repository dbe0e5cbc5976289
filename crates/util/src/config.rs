use std::{env, fmt, net::SocketAddr};

use url::Url;

use super::server_bind_address;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://store-admin.db?mode=rwc";
pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1/";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_key: String,
    pub stripe_api_base: Url,
    pub auth_token_secret: String,
    pub frontend_store_url: Url,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let stripe_api_base = env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string());
        let stripe_api_base = parse_url("STRIPE_API_BASE", &stripe_api_base)?;
        let frontend_store_url = parse_url("FRONTEND_STORE_URL", &required("FRONTEND_STORE_URL")?)?;

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            stripe_api_key: required("STRIPE_API_KEY")?,
            stripe_api_base,
            auth_token_secret: required("AUTH_TOKEN_SECRET")?,
            frontend_store_url,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|err| ConfigError::InvalidUrl { name, source: err })
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    Missing(&'static str),
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::Missing(name) => write!(f, "{name} must be set"),
            Self::InvalidUrl { name, source } => write!(f, "invalid {name} value: {source}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::ENV_GUARD;
    use crate::DEFAULT_BIND_ADDR;

    const REQUIRED: [(&str, &str); 4] = [
        ("STRIPE_WEBHOOK_SECRET", "whsec_test"),
        ("STRIPE_API_KEY", "sk_test"),
        ("AUTH_TOKEN_SECRET", "auth-secret"),
        ("FRONTEND_STORE_URL", "http://localhost:3001"),
    ];

    fn set_required() {
        for (key, value) in REQUIRED {
            env::set_var(key, value);
        }
    }

    fn clear_all() {
        for (key, _) in REQUIRED {
            env::remove_var(key);
        }
        for key in ["APP_ENV", "APP_BIND_ADDR", "DATABASE_URL", "STRIPE_API_BASE"] {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_in_development() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_all();
        set_required();

        let config = AppConfig::from_env().expect("config should load with defaults");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.stripe_api_base.as_str(), DEFAULT_STRIPE_API_BASE);
        assert_eq!(config.frontend_store_url.as_str(), "http://localhost:3001/");

        clear_all();
    }

    #[test]
    fn rejects_invalid_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_all();
        env::set_var("APP_ENV", "invalid");

        let err = AppConfig::from_env().expect_err("invalid env should error");
        assert!(matches!(err, ConfigError::InvalidEnvironment(value) if value == "invalid"));

        clear_all();
    }

    #[test]
    fn reports_missing_webhook_secret() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_all();
        set_required();
        env::set_var("STRIPE_WEBHOOK_SECRET", "  ");

        let err = AppConfig::from_env().expect_err("blank secret should error");
        assert!(matches!(err, ConfigError::Missing("STRIPE_WEBHOOK_SECRET")));
        assert_eq!(err.to_string(), "STRIPE_WEBHOOK_SECRET must be set");

        clear_all();
    }

    #[test]
    fn rejects_malformed_frontend_url() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_all();
        set_required();
        env::set_var("FRONTEND_STORE_URL", "not a url");

        let err = AppConfig::from_env().expect_err("bad url should error");
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                name: "FRONTEND_STORE_URL",
                ..
            }
        ));

        clear_all();
    }

    #[test]
    fn parses_production_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_all();
        set_required();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_BIND_ADDR", "0.0.0.0:9000");
        env::set_var("DATABASE_URL", "sqlite::memory:");

        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.database_url, "sqlite::memory:");

        clear_all();
    }
}
