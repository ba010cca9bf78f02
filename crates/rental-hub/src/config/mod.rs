use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

pub mod verify;

const DEVELOPMENT_SECRET_KEY: &str = "rental-hub-development-secret-key";
const DEFAULT_DATABASE_NAME: &str = "rental-hub.sqlite3";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub security: SecurityConfig,
    pub database: DatabaseConfig,
    pub mail: MailConfig,
    pub maps_api_key: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment =
            AppEnvironment::from_str(&var("APP_ENV").unwrap_or_else(|| "development".to_string()));

        let host = var("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("APP_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        let base_url = var("APP_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://{host}:{port}"));

        let log_level = var("APP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let secret_key = match (var("SECRET_KEY"), environment) {
            (Some(key), _) => key,
            (None, AppEnvironment::Production) => return Err(ConfigError::MissingSecretKey),
            (None, _) => DEVELOPMENT_SECRET_KEY.to_string(),
        };
        let session_ttl_hours = parse_number(&var, "SESSION_TTL_HOURS", 24 * 14)?;
        let password_reset_ttl_minutes = parse_number(&var, "PASSWORD_RESET_TTL_MINUTES", 60)?;

        let database = DatabaseConfig::from_vars(&var)?;
        let mail = MailConfig::from_vars(&var, environment)?;

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                base_url,
            },
            telemetry: TelemetryConfig { log_level },
            security: SecurityConfig {
                secret_key,
                session_ttl_hours,
                password_reset_ttl_minutes,
            },
            database,
            mail,
            maps_api_key: var("GOOGLE_MAPS_API_KEY"),
        })
    }
}

fn parse_number<F>(var: &F, key: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidNumber { key }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public origin used when building links sent by email.
    pub base_url: String,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Password pepper and token lifetimes.
#[derive(Clone)]
pub struct SecurityConfig {
    pub secret_key: String,
    pub session_ttl_hours: u32,
    pub password_reset_ttl_minutes: u32,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("secret_key", &"<redacted>")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("password_reset_ttl_minutes", &self.password_reset_ttl_minutes)
            .finish()
    }
}

/// Reduces dotted module paths such as `backends.smtp.EmailBackend` to their short name so
/// older `.env` files keep working.
fn short_name(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    let trimmed = lowered.strip_suffix(".emailbackend").unwrap_or(&lowered);
    trimmed.rsplit('.').next().unwrap_or(trimmed).to_string()
}

fn parse_flag<F>(var: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key }),
        },
    }
}

/// SQLite database location and pool size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// File path, or `:memory:` for a private database that lives as long as the process.
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    fn from_vars<F>(var: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = var("DB_ENGINE") {
            if !matches!(short_name(&raw).as_str(), "sqlite" | "sqlite3") {
                return Err(ConfigError::UnsupportedStoreEngine(raw));
            }
        }

        Ok(Self {
            name: var("DB_NAME").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
            max_connections: parse_number(var, "DB_MAX_CONNECTIONS", 5)?,
        })
    }

    pub fn is_memory(&self) -> bool {
        self.name == ":memory:"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
    /// Logs every message, body included. Refused in production.
    Console,
    Smtp,
    Memory,
    Disabled,
}

impl MailBackend {
    fn parse(raw: &str) -> Option<Self> {
        match short_name(raw).as_str() {
            "console" | "log" => Some(Self::Console),
            "smtp" => Some(Self::Smtp),
            "memory" | "locmem" => Some(Self::Memory),
            "disabled" | "dummy" | "none" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Relay settings for the SMTP backend.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Upgrade the connection with STARTTLS.
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub backend: MailBackend,
    pub from_address: String,
    /// Present exactly when `backend` is [`MailBackend::Smtp`].
    pub smtp: Option<SmtpConfig>,
}

impl MailConfig {
    fn from_vars<F>(var: &F, environment: AppEnvironment) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match var("EMAIL_BACKEND") {
            None => MailBackend::Console,
            Some(raw) => MailBackend::parse(&raw).ok_or(ConfigError::UnsupportedMailBackend(raw))?,
        };
        if environment == AppEnvironment::Production && backend == MailBackend::Console {
            return Err(ConfigError::ConsoleMailInProduction);
        }

        let smtp = match backend {
            MailBackend::Smtp => Some(SmtpConfig {
                host: var("EMAIL_HOST").ok_or(ConfigError::MissingSetting("EMAIL_HOST"))?,
                port: match var("EMAIL_PORT") {
                    None => DEFAULT_SMTP_PORT,
                    Some(raw) => raw
                        .trim()
                        .parse::<u16>()
                        .map_err(|_| ConfigError::InvalidNumber { key: "EMAIL_PORT" })?,
                },
                use_tls: parse_flag(var, "EMAIL_USE_TLS", true)?,
                username: var("EMAIL_HOST_USER"),
                password: var("EMAIL_HOST_PASSWORD"),
            }),
            MailBackend::Console | MailBackend::Memory | MailBackend::Disabled => None,
        };

        Ok(Self {
            backend,
            from_address: var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|| "noreply@example.com".to_string()),
            smtp,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidFlag { key: &'static str },
    MissingSecretKey,
    MissingSetting(&'static str),
    ConsoleMailInProduction,
    UnsupportedStoreEngine(String),
    UnsupportedMailBackend(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive whole number")
            }
            ConfigError::InvalidFlag { key } => {
                write!(f, "{key} must be true or false")
            }
            ConfigError::MissingSecretKey => {
                write!(f, "SECRET_KEY must be set when APP_ENV is production")
            }
            ConfigError::MissingSetting(key) => write!(f, "{key} must be set"),
            ConfigError::ConsoleMailInProduction => write!(
                f,
                "EMAIL_BACKEND must name a delivering backend when APP_ENV is production"
            ),
            ConfigError::UnsupportedStoreEngine(value) => {
                write!(f, "DB_ENGINE '{value}' is not supported (expected sqlite)")
            }
            ConfigError::UnsupportedMailBackend(value) => write!(
                f,
                "EMAIL_BACKEND '{value}' is not supported (expected smtp, console, memory or disabled)"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
