//! Typed Rust client for the UpCloud REST API (v1.3).
//!
//! Covers the subset needed for managing servers:
//! servers (create, get, modify, start, stop, delete with storages),
//! network interfaces (create, delete), zones and account lookup.

mod config;
mod types;

pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use reqwest::StatusCode;
pub use types::*;

use serde_json::json;
use types::{AccountEnvelope, InterfaceEnvelope, ServerEnvelope, ZonesEnvelope};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("upcloud api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upcloud api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("timed out waiting for server {uuid} to reach state {state}")]
    Timeout { uuid: String, state: ServerState },
}

impl Error {
    /// True when the API answered 404 for the addressed object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which failures a request may be repeated after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Transport errors, timeouts, 429 and 5xx.
    Idempotent,
    /// Only failures where the API cannot have acted on the request:
    /// connection errors and 429. A timed out or 5xx create may still have
    /// created the object.
    Unprocessed,
}

impl Retry {
    fn status(self, status: StatusCode) -> bool {
        match self {
            Self::Idempotent => {
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Unprocessed => status == StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn transport(self, err: &reqwest::Error) -> bool {
        match self {
            Self::Idempotent => err.is_connect() || err.is_timeout(),
            Self::Unprocessed => err.is_connect(),
        }
    }
}

/// Client for the UpCloud REST API.
#[derive(Clone)]
pub struct UpcloudClient {
    username: String,
    password: String,
    config: ClientConfig,
    http: reqwest::Client,
}

impl UpcloudClient {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Self::with_config(username, password, ClientConfig::default())
    }

    pub fn with_config(
        username: impl Into<String>,
        password: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            username: username.into(),
            password: password.into(),
            config,
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    /// Sends the request built by `build`, retrying transport failures, 429
    /// and 5xx responses with exponential backoff.
    async fn send<F>(&self, endpoint: &'static str, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        self.send_with(endpoint, Retry::Idempotent, build).await
    }

    async fn send_with<F>(
        &self,
        endpoint: &'static str,
        retry: Retry,
        build: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let outcome = build(&self.http)
                .basic_auth(&self.username, Some(&self.password))
                .send()
                .await;

            let retryable = match &outcome {
                Ok(resp) => retry.status(resp.status()),
                Err(e) => retry.transport(e),
            };

            if !retryable || attempt >= self.config.retry_max {
                return Self::check(outcome?, endpoint).await;
            }

            let wait = self.config.backoff(attempt);
            attempt += 1;
            warn!(
                endpoint,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "upcloud: retrying request"
            );
            sleep(wait).await;
        }
    }

    // ── Servers ──────────────────────────────────────────────────────

    pub async fn get_server_details(&self, uuid: &str) -> Result<ServerDetails> {
        let url = self.url(&format!("/server/{uuid}"));
        let resp = self.send("get server details", |http| http.get(&url)).await?;

        let envelope: ServerEnvelope = resp.json().await?;
        Ok(envelope.server)
    }

    pub async fn create_server(&self, req: &CreateServerRequest) -> Result<ServerDetails> {
        let url = self.url("/server");
        let body = json!({ "server": req });
        let resp = self
            .send_with("create server", Retry::Unprocessed, |http| {
                http.post(&url).json(&body)
            })
            .await?;

        let envelope: ServerEnvelope = resp.json().await?;
        Ok(envelope.server)
    }

    pub async fn modify_server(&self, uuid: &str, req: &ModifyServerRequest) -> Result<ServerDetails> {
        let url = self.url(&format!("/server/{uuid}"));
        let body = json!({ "server": req });
        let resp = self
            .send("modify server", |http| http.put(&url).json(&body))
            .await?;

        let envelope: ServerEnvelope = resp.json().await?;
        Ok(envelope.server)
    }

    /// Deletes the server together with every storage attached to it.
    pub async fn delete_server_and_storages(&self, uuid: &str) -> Result<()> {
        let url = self.url(&format!("/server/{uuid}"));
        self.send("delete server", |http| {
            http.delete(&url).query(&[("storages", "1")])
        })
        .await?;
        Ok(())
    }

    pub async fn start_server(&self, uuid: &str) -> Result<ServerDetails> {
        let url = self.url(&format!("/server/{uuid}/start"));
        let resp = self.send("start server", |http| http.post(&url)).await?;

        let envelope: ServerEnvelope = resp.json().await?;
        Ok(envelope.server)
    }

    pub async fn stop_server(&self, uuid: &str, req: &StopServerRequest) -> Result<ServerDetails> {
        let url = self.url(&format!("/server/{uuid}/stop"));
        let body = json!({ "stop_server": req });
        let resp = self
            .send("stop server", |http| http.post(&url).json(&body))
            .await?;

        let envelope: ServerEnvelope = resp.json().await?;
        Ok(envelope.server)
    }

    /// Polls server details until the server reports `desired`, or fails
    /// with [`Error::Timeout`] after `state_wait_timeout`.
    pub async fn wait_for_server_state(
        &self,
        uuid: &str,
        desired: ServerState,
    ) -> Result<ServerDetails> {
        let deadline = Instant::now() + self.config.state_wait_timeout;
        loop {
            let details = self.get_server_details(uuid).await?;
            if details.state == desired {
                return Ok(details);
            }

            debug!(server_uuid = %uuid, state = %details.state, desired = %desired, "upcloud: waiting for server state");

            if Instant::now() >= deadline {
                return Err(Error::Timeout {
                    uuid: uuid.to_string(),
                    state: desired,
                });
            }
            sleep(self.config.state_poll_interval).await;
        }
    }

    // ── Network interfaces ───────────────────────────────────────────

    pub async fn create_network_interface(
        &self,
        uuid: &str,
        req: &CreateNetworkInterfaceRequest,
    ) -> Result<ServerInterface> {
        let url = self.url(&format!("/server/{uuid}/networking/interface"));
        let body = json!({ "interface": req });
        let resp = self
            .send_with("create network interface", Retry::Unprocessed, |http| {
                http.post(&url).json(&body)
            })
            .await?;

        let envelope: InterfaceEnvelope = resp.json().await?;
        Ok(envelope.interface)
    }

    pub async fn delete_network_interface(&self, uuid: &str, index: u32) -> Result<()> {
        let url = self.url(&format!("/server/{uuid}/networking/interface/{index}"));
        self.send("delete network interface", |http| http.delete(&url))
            .await?;
        Ok(())
    }

    // ── Catalog / account ────────────────────────────────────────────

    pub async fn get_zones(&self) -> Result<Vec<Zone>> {
        let url = self.url("/zone");
        let resp = self.send("get zones", |http| http.get(&url)).await?;

        let envelope: ZonesEnvelope = resp.json().await?;
        Ok(envelope.zones.zone)
    }

    pub async fn get_account(&self) -> Result<Account> {
        let url = self.url("/account");
        let resp = self.send("get account", |http| http.get(&url)).await?;

        let envelope: AccountEnvelope = resp.json().await?;
        Ok(envelope.account)
    }
}
