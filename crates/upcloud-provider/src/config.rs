use std::fmt;
use std::time::Duration;

use upcloud_api::ClientConfig;

use crate::{Error, Result};

/// Credentials and transport settings for one provider instance.
#[derive(Clone)]
pub struct ProviderConfig {
    pub username: String,
    pub password: String,
    pub client: ClientConfig,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client", &self.client)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            client: ClientConfig::default(),
        }
    }

    /// Load configuration from environment variables, reading `.env` first
    /// when present.
    ///
    /// `UPCLOUD_USERNAME` and `UPCLOUD_PASSWORD` are required. Retry and
    /// timeout settings fall back to [`ClientConfig::default`].
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::MissingEnv(key.into()))
        };

        let mut config = Self::new(required("UPCLOUD_USERNAME")?, required("UPCLOUD_PASSWORD")?);
        let client = &mut config.client;

        if let Some(secs) = parse_number(&lookup, "UPCLOUD_REQUEST_TIMEOUT_SEC")? {
            client.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_number(&lookup, "UPCLOUD_RETRY_MAX")? {
            client.retry_max = u32::try_from(retries)
                .map_err(|_| Error::Config(format!("UPCLOUD_RETRY_MAX out of range: {retries}")))?;
        }
        if let Some(secs) = parse_number(&lookup, "UPCLOUD_RETRY_WAIT_MIN_SEC")? {
            client.retry_wait_min = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_number(&lookup, "UPCLOUD_RETRY_WAIT_MAX_SEC")? {
            client.retry_wait_max = Duration::from_secs(secs);
        }

        if client.retry_wait_min > client.retry_wait_max {
            return Err(Error::Config(format!(
                "UPCLOUD_RETRY_WAIT_MIN_SEC ({}) exceeds UPCLOUD_RETRY_WAIT_MAX_SEC ({})",
                client.retry_wait_min.as_secs(),
                client.retry_wait_max.as_secs()
            )));
        }

        Ok(config)
    }
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}
