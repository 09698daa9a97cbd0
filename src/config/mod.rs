use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub iban: IbanConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_duration_hours: i64,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IbanConfig {
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    pub cache_ttl_seconds: u64,
    pub cache_capacity: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    pub from_address: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            from_address: "Refund Desk <no-reply@localhost>".to_string(),
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://refund_desk.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("auth.jwt_secret", "change-me-in-production")?
            .set_default("auth.access_token_minutes", 5)?
            .set_default("auth.refresh_token_hours", 24)?
            .set_default("iban.api_url", "https://api.api-ninjas.com/v1/iban")?
            .set_default("iban.cache_ttl_seconds", 86_400)?
            .set_default("iban.cache_capacity", 10_000)?
            .set_default("email.enabled", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with REFUND_DESK__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("REFUND_DESK").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://refund_desk.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_duration_hours: 24,
                jwt_secret: "change-me-in-production".to_string(),
                access_token_minutes: 5,
                refresh_token_hours: 24,
            },
            iban: IbanConfig {
                api_url: "https://api.api-ninjas.com/v1/iban".to_string(),
                api_key: String::new(),
                cache_ttl_seconds: 86_400,
                cache_capacity: 10_000,
            },
            email: EmailConfig::default(),
        }
    }
}
