//! Process configuration, read once at startup.

use crate::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SCORES_API_BASE};
use anyhow::{Context, Result, bail};
use std::str::FromStr;
use std::time::Duration;

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const SCORES_API_BASE_VAR: &str = "SCORES_API_BASE";
pub const REQUEST_TIMEOUT_VAR: &str = "SCORES_REQUEST_TIMEOUT_SECS";
pub const TARGET_WEEK_VAR: &str = "TARGET_WEEK_NUMBER";
pub const CRON_SECRET_VAR: &str = "CRON_SECRET";

/// Where to fetch summaries from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_SCORES_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Connection string, credentials included.
    pub database_url: String,
    pub provider: ProviderConfig,
    /// Logged for operators. Candidate selection does not filter on it.
    pub target_week: Option<u32>,
    /// When set, the HTTP trigger wants `Authorization: Bearer <secret>`.
    pub cron_secret: Option<String>,
}

// keep credentials out of logs
impl std::fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestConfig")
            .field("database_url", &"<redacted>")
            .field("provider", &self.provider)
            .field("target_week", &self.target_week)
            .field("cron_secret", &self.cron_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Load a `.env` file from the working directory if there is one.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        log::debug!("Loaded environment from {}", path.display());
    }
}

fn parse_optional<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{name} must be a number, got {v:?}")),
        None => Ok(None),
    }
}

impl IngestConfig {
    /// Read the configuration from the process environment (and `.env`).
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a numeric setting
    /// does not parse.
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a numeric setting
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(database_url) = lookup(DATABASE_URL_VAR).filter(|v| !v.trim().is_empty()) else {
            bail!("Missing {DATABASE_URL_VAR} in server env");
        };

        let api_base = lookup(SCORES_API_BASE_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SCORES_API_BASE.to_string());
        let timeout_secs = parse_optional::<u64>(REQUEST_TIMEOUT_VAR, lookup(REQUEST_TIMEOUT_VAR))?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            bail!("{REQUEST_TIMEOUT_VAR} must be greater than zero");
        }

        Ok(Self {
            database_url,
            provider: ProviderConfig {
                api_base,
                timeout: Duration::from_secs(timeout_secs),
            },
            target_week: parse_optional(TARGET_WEEK_VAR, lookup(TARGET_WEEK_VAR))?,
            cron_secret: lookup(CRON_SECRET_VAR).filter(|v| !v.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<IngestConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        IngestConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_missing_database_url_is_fatal() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = config_from(&[("DATABASE_URL", "  ")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://svc:pw@db/sheet")]).unwrap();
        assert_eq!(config.database_url, "postgres://svc:pw@db/sheet");
        assert_eq!(config.provider, ProviderConfig::default());
        assert_eq!(config.target_week, None);
        assert_eq!(config.cron_secret, None);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://svc:pw@db/sheet"),
            ("SCORES_API_BASE", "http://localhost:9000/nfl"),
            ("SCORES_REQUEST_TIMEOUT_SECS", "3"),
            ("TARGET_WEEK_NUMBER", " 7 "),
            ("CRON_SECRET", "hunter2"),
        ])
        .unwrap();
        assert_eq!(config.provider.api_base, "http://localhost:9000/nfl");
        assert_eq!(config.provider.timeout, Duration::from_secs(3));
        assert_eq!(config.target_week, Some(7));
        assert_eq!(config.cron_secret.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_bad_numbers_are_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://db/sheet"),
            ("TARGET_WEEK_NUMBER", "seven"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("TARGET_WEEK_NUMBER"));

        let err = config_from(&[
            ("DATABASE_URL", "postgres://db/sheet"),
            ("SCORES_REQUEST_TIMEOUT_SECS", "0"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://svc:pw@db/sheet"),
            ("CRON_SECRET", "hunter2"),
        ])
        .unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("pw@db"));
        assert!(!printed.contains("hunter2"));
    }
}
