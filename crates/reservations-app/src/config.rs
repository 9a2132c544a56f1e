//! Configuration read from environment variables.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use reservations_core::retry::RetryPolicy;

use crate::error::AppError;

/// Which event store backs the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    /// Process-local store; history is lost on exit.
    Memory,
    /// PostgreSQL store.
    Postgres {
        /// Connection string.
        database_url: String,
        /// Pool size.
        max_connections: u32,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Selected event store.
    pub store: StoreKind,
    /// Retry policy for concurrency conflicts.
    pub retry: RetryPolicy,
    /// Default per-command timeout, if any.
    pub command_timeout: Option<Duration>,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is missing or invalid.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns the value of a
    /// variable or `None` if it is unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("RESERVATIONS_STORE").as_deref() {
            None | Some("memory") => StoreKind::Memory,
            Some("postgres") => StoreKind::Postgres {
                database_url: lookup("DATABASE_URL").ok_or_else(|| {
                    AppError::Config(
                        "DATABASE_URL must be set when RESERVATIONS_STORE=postgres".into(),
                    )
                })?,
                max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            Some(other) => {
                return Err(AppError::Config(format!(
                    "RESERVATIONS_STORE must be \"memory\" or \"postgres\", got {other:?}"
                )));
            }
        };

        let max_attempts: u32 = parse(&lookup, "RETRY_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(AppError::Config(
                "RETRY_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        let initial_delay = Duration::from_millis(parse(&lookup, "RETRY_INITIAL_DELAY_MS", 10)?);
        let max_delay = Duration::from_millis(parse(&lookup, "RETRY_MAX_DELAY_MS", 1000)?);
        if max_delay < initial_delay {
            return Err(AppError::Config(
                "RETRY_MAX_DELAY_MS must not be less than RETRY_INITIAL_DELAY_MS".into(),
            ));
        }

        let command_timeout = lookup("COMMAND_TIMEOUT_MS")
            .map(|raw| parse_value::<u64>("COMMAND_TIMEOUT_MS", &raw))
            .transpose()?
            .map(Duration::from_millis);

        Ok(Self {
            store,
            retry: RetryPolicy::builder()
                .max_attempts(max_attempts)
                .initial_delay(initial_delay)
                .max_delay(max_delay)
                .build(),
            command_timeout,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}")))
}
