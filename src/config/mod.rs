use std::env;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while loading configuration. Startup aborts on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string, or `memory://` for the in-process store
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

impl DatabaseConfig {
    /// Connection string with any password replaced, safe for logs
    pub fn redacted_url(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(mut parsed) => {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("****"));
                }
                parsed.to_string()
            }
            Err(_) => "<unparseable database url>".to_string(),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.redacted_url())
            .field("max_connections", &self.max_connections)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub session_secret: String,
    pub session_ttl_days: i64,
    pub secure_cookies: bool,
    pub cors_origins: Vec<String>,
    pub otp_ttl_minutes: i64,
    pub otp_max_attempts: u32,
    pub otp_resend_seconds: i64,
}

// Hand-written so the session secret never lands in a log line.
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("session_secret", &"<redacted>")
            .field("session_ttl_days", &self.session_ttl_days)
            .field("secure_cookies", &self.secure_cookies)
            .field("cors_origins", &self.cors_origins)
            .field("otp_ttl_minutes", &self.otp_ttl_minutes)
            .field("otp_max_attempts", &self.otp_max_attempts)
            .field("otp_resend_seconds", &self.otp_resend_seconds)
            .finish()
    }
}

#[derive(Clone)]
pub struct MailConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish()
    }
}

impl Environment {
    fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment presets are selected by `APP_ENV`, then individual variables
    /// override the preset. Required values that are still missing afterwards
    /// are reported as errors rather than defaulted.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env_value(env::var("APP_ENV").ok().as_deref());

        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()?;

        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        // Server
        if let Some(port) = optional_var("PORT")? {
            self.server.port = port;
        }

        // Database
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = optional_var("DATABASE_MAX_CONNECTIONS")? {
            self.database.max_connections = v;
        }
        if let Some(v) = optional_var("DATABASE_CONNECTION_TIMEOUT")? {
            self.database.connection_timeout = v;
        }

        // Security
        if let Ok(v) = env::var("SESSION_SECRET") {
            self.security.session_secret = v;
        }
        if let Some(v) = optional_var("SESSION_TTL_DAYS")? {
            self.security.session_ttl_days = v;
        }
        if let Some(v) = optional_var("SECURITY_SECURE_COOKIES")? {
            self.security.secure_cookies = v;
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = optional_var("OTP_TTL_MINUTES")? {
            self.security.otp_ttl_minutes = v;
        }
        if let Some(v) = optional_var("OTP_MAX_ATTEMPTS")? {
            self.security.otp_max_attempts = v;
        }
        if let Some(v) = optional_var("OTP_RESEND_SECONDS")? {
            self.security.otp_resend_seconds = v;
        }

        // Mail
        if let Ok(v) = env::var("MAIL_API_URL") {
            self.mail.api_url = Some(v);
        }
        if let Ok(v) = env::var("MAIL_API_KEY") {
            self.mail.api_key = Some(v);
        }
        if let Ok(v) = env::var("MAIL_FROM") {
            self.mail.from = v;
        }

        Ok(self)
    }

    /// Check that everything the process cannot run without is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.security.session_secret.is_empty() {
            return Err(ConfigError::Missing("SESSION_SECRET"));
        }
        if self.security.session_ttl_days <= 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL_DAYS",
                value: self.security.session_ttl_days.to_string(),
            });
        }
        if self.security.otp_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "OTP_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if self.environment != Environment::Development {
            if self.security.session_secret.len() < 32 {
                return Err(ConfigError::Invalid {
                    name: "SESSION_SECRET",
                    value: "must be at least 32 bytes outside development".to_string(),
                });
            }
            if self.mail.api_url.is_none() {
                return Err(ConfigError::Missing("MAIL_API_URL"));
            }
            if self.mail.api_key.is_none() {
                return Err(ConfigError::Missing("MAIL_API_KEY"));
            }
        }

        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                session_secret: String::new(),
                session_ttl_days: 7,
                secure_cookies: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                otp_ttl_minutes: 10,
                otp_max_attempts: 5,
                otp_resend_seconds: 30,
            },
            mail: MailConfig {
                api_url: None,
                api_key: None,
                from: "no-reply@localhost".to_string(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 8080 },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                session_secret: String::new(),
                session_ttl_days: 7,
                secure_cookies: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                otp_ttl_minutes: 10,
                otp_max_attempts: 5,
                otp_resend_seconds: 30,
            },
            mail: MailConfig {
                api_url: None,
                api_key: None,
                from: "no-reply@staging.example.com".to_string(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 8080 },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                session_secret: String::new(),
                session_ttl_days: 7,
                secure_cookies: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                otp_ttl_minutes: 5,
                otp_max_attempts: 3,
                otp_resend_seconds: 60,
            },
            mail: MailConfig {
                api_url: None,
                api_key: None,
                from: "no-reply@example.com".to_string(),
            },
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn optional_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(None),
    }
}
