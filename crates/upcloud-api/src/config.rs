use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.upcloud.com/1.3";

/// Transport settings for [`crate::UpcloudClient`].
///
/// Built once at startup and handed to the client by value; nothing here is
/// read from the environment directly.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout, including retries' individual attempts.
    pub request_timeout: Duration,
    /// Additional attempts after the first one for retryable failures.
    pub retry_max: u32,
    pub retry_wait_min: Duration,
    pub retry_wait_max: Duration,
    /// How often `wait_for_server_state` polls server details.
    pub state_poll_interval: Duration,
    pub state_wait_timeout: Duration,
}

impl ClientConfig {
    /// Exponential backoff for the given zero-based retry attempt, clamped to
    /// `retry_wait_min..=retry_wait_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.retry_wait_min
            .saturating_mul(factor)
            .clamp(self.retry_wait_min, self.retry_wait_max.max(self.retry_wait_min))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            user_agent: format!("upcloud-provider/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(120),
            retry_max: 4,
            retry_wait_min: Duration::from_secs(1),
            retry_wait_max: Duration::from_secs(30),
            state_poll_interval: Duration::from_secs(5),
            state_wait_timeout: Duration::from_secs(25 * 60),
        }
    }
}
