//! Worker configuration
//!
//! Read from the environment (and `.env` through dotenvy):
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | required |
//! | `DATABASE_MAX_CONNECTIONS` | `5` |
//! | `MAIL_FROM` | `noreply@taskboard.local` |
//! | `MAIL_TRANSPORT` | `log` (`log` or `http`) |
//! | `MAIL_API_URL`, `MAIL_API_KEY` | required when `MAIL_TRANSPORT=http` |
//! | `WORKER_POLL_INTERVAL_SECS` | `2` |
//! | `WORKER_BATCH_SIZE` | `20` |
//! | `WORKER_MAX_CONCURRENT` | `4` |
//! | `WORKER_MAX_ATTEMPTS` | `5` |
//! | `WORKER_LEASE_SECS` | `60` |

use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::dispatcher::DispatcherConfig;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseSettings,
    pub mail: MailConfig,
    pub dispatcher: DispatcherConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Sender address on every mail
    pub from: String,
    pub transport: MailTransport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailTransport {
    Log,
    Http { url: String, api_key: String },
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 5u32)?;

        let from = env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@taskboard.local".to_string());
        if !from.contains('@') {
            bail!("MAIL_FROM must be an email address, got {:?}", from);
        }

        let transport = parse_transport(
            &env::var("MAIL_TRANSPORT").unwrap_or_else(|_| "log".to_string()),
            env::var("MAIL_API_URL").ok(),
            env::var("MAIL_API_KEY").ok(),
        )?;

        let defaults = DispatcherConfig::default();
        let dispatcher = DispatcherConfig {
            poll_interval: Duration::from_secs(parse_or(
                "WORKER_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )?),
            batch_size: parse_or("WORKER_BATCH_SIZE", defaults.batch_size)?,
            max_concurrent: parse_or("WORKER_MAX_CONCURRENT", defaults.max_concurrent)?,
            max_attempts: parse_or("WORKER_MAX_ATTEMPTS", defaults.max_attempts)?,
            lease: Duration::from_secs(parse_or("WORKER_LEASE_SECS", defaults.lease.as_secs())?),
        };

        if dispatcher.batch_size == 0 || dispatcher.max_concurrent == 0 || dispatcher.max_attempts < 1 {
            bail!("WORKER_BATCH_SIZE, WORKER_MAX_CONCURRENT and WORKER_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            database: DatabaseSettings {
                url,
                max_connections,
            },
            mail: MailConfig { from, transport },
            dispatcher,
        })
    }
}

fn parse_transport(
    name: &str,
    url: Option<String>,
    api_key: Option<String>,
) -> Result<MailTransport> {
    match name.trim().to_ascii_lowercase().as_str() {
        "log" => Ok(MailTransport::Log),
        "http" => Ok(MailTransport::Http {
            url: url.context("MAIL_API_URL must be set when MAIL_TRANSPORT=http")?,
            api_key: api_key.context("MAIL_API_KEY must be set when MAIL_TRANSPORT=http")?,
        }),
        other => bail!("Unknown MAIL_TRANSPORT {:?}, expected \"log\" or \"http\"", other),
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, value)),
        Err(_) => Ok(default),
    }
}
