use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Minimum length of `SECRET_KEY`, needed to derive the cookie signing key.
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub mail: Option<MailConfig>,
    pub session: SessionConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub registration_url: String,
    pub validation_url: String,
    pub timeout: Duration,
    /// `None` disables the background retry of unsynced entries.
    pub retry_interval: Option<Duration>,
    pub retry_batch: u32,
    /// How old an unsynced entry must be before the reconciler retries it.
    pub retry_settle: Duration,
}

#[derive(Debug)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from: String,
    pub subject: String,
}

#[derive(Debug)]
pub struct SessionConfig {
    /// Signs flash cookies. A random key is generated when absent.
    pub secret: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub environment: Environment,
    pub static_dir: String,
    pub validation_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server configuration
        let host = parse_or(&lookup, "SERVER_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port = parse_or(&lookup, "SERVER_PORT", 8000_u16)?;

        // Database configuration
        let db_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10_u32)?;
        let min_connections = parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", 1_u32)?;

        // Ledger webhooks
        let registration_url =
            lookup("REGISTRATION_SCRIPT_URL").context("REGISTRATION_SCRIPT_URL must be set")?;
        let validation_url =
            lookup("VALIDATION_SCRIPT_URL").context("VALIDATION_SCRIPT_URL must be set")?;
        let timeout_secs = parse_or(&lookup, "LEDGER_TIMEOUT_SECS", 30_u64)?;
        let timeout = Duration::from_secs(timeout_secs);
        let retry_interval = match parse_or(&lookup, "LEDGER_RETRY_INTERVAL_SECS", 60_u64)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let retry_batch = parse_or(&lookup, "LEDGER_RETRY_BATCH", 50_u32)?;
        let settle_secs = parse_or(
            &lookup,
            "LEDGER_RETRY_SETTLE_SECS",
            timeout_secs.saturating_mul(2),
        )?;
        if settle_secs < timeout_secs {
            bail!("LEDGER_RETRY_SETTLE_SECS must not be shorter than LEDGER_TIMEOUT_SECS");
        }

        // Outbound mail (optional)
        let mail = match (lookup("SMTP_USER"), lookup("SMTP_PASSWORD")) {
            (Some(username), Some(password)) => {
                let from = lookup("SMTP_FROM").unwrap_or_else(|| username.clone());
                Some(MailConfig {
                    host: lookup("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                    port: parse_or(&lookup, "SMTP_PORT", 587_u16)?,
                    username,
                    password: SecretString::from(password),
                    from,
                    subject: lookup("MAIL_SUBJECT")
                        .unwrap_or_else(|| "Event Registration Confirmation".to_string()),
                })
            }
            (None, None) => None,
            _ => bail!("SMTP_USER and SMTP_PASSWORD must be set together"),
        };

        // Session secret
        let secret = lookup("SECRET_KEY").map(SecretString::from);
        if let Some(secret) = &secret {
            if secret.expose_secret().len() < MIN_SECRET_LEN {
                bail!("SECRET_KEY must be at least {MIN_SECRET_LEN} bytes long");
            }
        }

        // App configuration
        let environment = lookup("APP_ENVIRONMENT")
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let app_name = lookup("APP_NAME").unwrap_or_else(|| "Event Check-in".to_string());
        let static_dir = lookup("STATIC_DIR").unwrap_or_else(|| "static".to_string());
        let validation_path =
            lookup("VALIDATION_PATH").unwrap_or_else(|| "/validate".to_string());
        check_validation_path(&validation_path)?;

        Ok(Config {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: db_url,
                max_connections: Some(max_connections),
                min_connections: Some(min_connections),
            },
            ledger: LedgerConfig {
                registration_url,
                validation_url,
                timeout,
                retry_interval,
                retry_batch,
                retry_settle: Duration::from_secs(settle_secs),
            },
            mail,
            session: SessionConfig { secret },
            app: AppConfig {
                name: app_name,
                environment,
                static_dir,
                validation_path,
            },
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    pub fn is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" => Ok(Environment::Development),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

/// Reserved by the router: the scan route may not shadow these.
const RESERVED_PATHS: [&str; 3] = ["/register", "/health", "/static"];

fn check_validation_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path.len() < 2 {
        bail!("VALIDATION_PATH must be an absolute path such as /validate");
    }
    if path.contains(['{', '}', '*']) {
        bail!("VALIDATION_PATH must not contain route parameters: {path}");
    }
    let trimmed = path.trim_end_matches('/');
    for reserved in RESERVED_PATHS {
        let nested = trimmed
            .strip_prefix(reserved)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if trimmed.is_empty() || nested {
            bail!("VALIDATION_PATH must not collide with {reserved}");
        }
    }
    Ok(())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {key}")),
        None => Ok(default),
    }
}
