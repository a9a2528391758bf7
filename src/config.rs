use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Deployment environment. Each one carries the presets the app factory
/// needs (debug tooling, default log level, migrations).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    Test,
}

impl Environment {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Environment::Production),
            "dev" | "development" => Ok(Environment::Development),
            "test" | "testing" => Ok(Environment::Test),
            other => Err(ConfigError::InvalidValue(format!(
                "APP_ENV must be one of prod, dev, test (got '{other}')"
            ))),
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Environment::Production => "info",
            Environment::Development => "debug",
            Environment::Test => "warn",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Production => "prod",
            Environment::Development => "dev",
            Environment::Test => "test",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub environment: Environment,
    pub database_url: String,
    pub secret_key: String,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub cache_ttl: Duration,
    pub run_migrations: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingEnvironmentVariable(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvironmentVariable(var) => {
                write!(f, "Missing required environment variable: {var}")
            }
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub const MIN_SECRET_KEY_LENGTH: usize = 32;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let environment = match env::var("APP_ENV") {
            Ok(value) => Environment::parse(&value)?,
            Err(_) => Environment::Production,
        };

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvironmentVariable("DATABASE_URL".to_string()))?;

        let secret_key = env::var("SECRET_KEY")
            .map_err(|_| ConfigError::MissingEnvironmentVariable("SECRET_KEY".to_string()))?;

        if secret_key.len() < MIN_SECRET_KEY_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "SECRET_KEY must be at least {MIN_SECRET_KEY_LENGTH} characters long"
            )));
        }

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("PORT must be a valid number".to_string()))?;

        let static_dir =
            PathBuf::from(env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()));

        let cache_ttl = env::var("CACHE_TTL_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| {
                ConfigError::InvalidValue("CACHE_TTL_SECONDS must be a valid number".to_string())
            })?;

        let run_migrations = match env::var("RUN_MIGRATIONS") {
            Ok(value) => parse_flag(&value)?,
            Err(_) => true,
        };

        Ok(Config {
            app_name: "Tegenaria".to_string(),
            environment,
            database_url,
            secret_key,
            host,
            port,
            static_dir,
            cache_ttl,
            run_migrations,
        })
    }

    /// Test preset: no migrations, short cache, local static dir.
    pub fn for_tests(database_url: &str, secret_key: &str) -> Self {
        Config {
            app_name: "Tegenaria".to_string(),
            environment: Environment::Test,
            database_url: database_url.to_string(),
            secret_key: secret_key.to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            static_dir: PathBuf::from("static"),
            cache_ttl: Duration::from_secs(1),
            run_migrations: false,
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_debug(&self) -> bool {
        self.environment.is_debug()
    }
}

fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!(
            "expected a boolean flag, got '{other}'"
        ))),
    }
}
