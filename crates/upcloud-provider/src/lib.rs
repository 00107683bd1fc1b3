//! Declarative lifecycle management for UpCloud servers.
//!
//! [`ServerResource`] turns a desired [`ServerModel`] into the smallest
//! sequence of UpCloud API calls that brings the remote server in line,
//! stopping the server around network interface changes and keeping
//! interfaces (and their addresses) that did not change.

pub mod config;
pub mod interfaces;
pub mod plan;
pub mod power;
pub mod server;
pub mod types;
pub mod zones;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use upcloud_api::{
    Account, CreateNetworkInterfaceRequest, CreateServerRequest, ModifyServerRequest,
    ServerDetails, ServerInterface, ServerState, StopServerRequest, UpcloudClient, Zone,
};

pub use config::ProviderConfig;
pub use interfaces::{ReconcileReport, interfaces_equivalent, reconcile_interfaces};
pub use plan::{PlannedAction, PlannedServer, plan_server};
pub use server::{ServerResource, requires_network_reconfiguration};
pub use types::{NetworkInterfaceModel, ServerModel};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("expected zone to be one of [{}], got {zone}", .available.join(", "))]
    InvalidZone { zone: String, available: Vec<String> },

    #[error("server {uuid} must be {required} to {action}, but is {actual}")]
    Precondition {
        uuid: String,
        action: &'static str,
        required: ServerState,
        actual: ServerState,
    },

    #[error("unable to {operation}: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: upcloud_api::Error,
    },

    #[error("unable to {operation} interface #{index}: {source}")]
    Interface {
        operation: &'static str,
        index: u32,
        #[source]
        source: upcloud_api::Error,
    },

    #[error("update stopped during {step}; earlier steps are not rolled back, refresh to recover: {source}")]
    PartialApply {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("authentication failed: {0}")]
    Authentication(#[source] upcloud_api::Error),

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Adapter for `map_err` naming the sub-operation that failed.
    pub(crate) fn remote(operation: &'static str) -> impl FnOnce(upcloud_api::Error) -> Self {
        move |source| Self::Remote { operation, source }
    }

    pub(crate) fn partial(step: &'static str) -> impl FnOnce(Self) -> Self {
        move |source| Self::PartialApply {
            step,
            source: Box::new(source),
        }
    }

    /// True when the underlying API call answered 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Remote { source, .. }
            | Self::Interface { source, .. }
            | Self::Authentication(source) => source.is_not_found(),
            Self::PartialApply { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The subset of the UpCloud API the server resource depends on.
///
/// Implemented by [`UpcloudClient`]; tests substitute an in-memory fake.
#[async_trait]
pub trait ServerApi: Send + Sync + 'static {
    async fn get_server_details(&self, uuid: &str) -> upcloud_api::Result<ServerDetails>;

    async fn create_server(&self, req: &CreateServerRequest) -> upcloud_api::Result<ServerDetails>;

    async fn modify_server(
        &self,
        uuid: &str,
        req: &ModifyServerRequest,
    ) -> upcloud_api::Result<ServerDetails>;

    async fn delete_server_and_storages(&self, uuid: &str) -> upcloud_api::Result<()>;

    async fn create_network_interface(
        &self,
        uuid: &str,
        req: &CreateNetworkInterfaceRequest,
    ) -> upcloud_api::Result<ServerInterface>;

    async fn delete_network_interface(&self, uuid: &str, index: u32) -> upcloud_api::Result<()>;

    async fn stop_server(&self, uuid: &str) -> upcloud_api::Result<ServerDetails>;

    async fn start_server(&self, uuid: &str) -> upcloud_api::Result<ServerDetails>;

    async fn wait_for_server_state(
        &self,
        uuid: &str,
        desired: ServerState,
    ) -> upcloud_api::Result<ServerDetails>;

    async fn get_zones(&self) -> upcloud_api::Result<Vec<Zone>>;

    async fn get_account(&self) -> upcloud_api::Result<Account>;
}

#[async_trait]
impl ServerApi for UpcloudClient {
    async fn get_server_details(&self, uuid: &str) -> upcloud_api::Result<ServerDetails> {
        UpcloudClient::get_server_details(self, uuid).await
    }

    async fn create_server(&self, req: &CreateServerRequest) -> upcloud_api::Result<ServerDetails> {
        UpcloudClient::create_server(self, req).await
    }

    async fn modify_server(
        &self,
        uuid: &str,
        req: &ModifyServerRequest,
    ) -> upcloud_api::Result<ServerDetails> {
        UpcloudClient::modify_server(self, uuid, req).await
    }

    async fn delete_server_and_storages(&self, uuid: &str) -> upcloud_api::Result<()> {
        UpcloudClient::delete_server_and_storages(self, uuid).await
    }

    async fn create_network_interface(
        &self,
        uuid: &str,
        req: &CreateNetworkInterfaceRequest,
    ) -> upcloud_api::Result<ServerInterface> {
        UpcloudClient::create_network_interface(self, uuid, req).await
    }

    async fn delete_network_interface(&self, uuid: &str, index: u32) -> upcloud_api::Result<()> {
        UpcloudClient::delete_network_interface(self, uuid, index).await
    }

    async fn stop_server(&self, uuid: &str) -> upcloud_api::Result<ServerDetails> {
        UpcloudClient::stop_server(self, uuid, &StopServerRequest::default()).await
    }

    async fn start_server(&self, uuid: &str) -> upcloud_api::Result<ServerDetails> {
        UpcloudClient::start_server(self, uuid).await
    }

    async fn wait_for_server_state(
        &self,
        uuid: &str,
        desired: ServerState,
    ) -> upcloud_api::Result<ServerDetails> {
        UpcloudClient::wait_for_server_state(self, uuid, desired).await
    }

    async fn get_zones(&self) -> upcloud_api::Result<Vec<Zone>> {
        UpcloudClient::get_zones(self).await
    }

    async fn get_account(&self) -> upcloud_api::Result<Account> {
        UpcloudClient::get_account(self).await
    }
}

/// A configured connection to the UpCloud API, shared by every resource
/// controller it hands out.
#[derive(Clone)]
pub struct Provider {
    api: Arc<dyn ServerApi>,
}

impl Provider {
    /// Build the API client from `config` and verify the credentials.
    pub async fn configure(config: &ProviderConfig) -> Result<Self> {
        let client = UpcloudClient::with_config(
            config.username.clone(),
            config.password.clone(),
            config.client.clone(),
        )
        .map_err(Error::remote("build api client"))?;

        Self::connect(Arc::new(client), config).await
    }

    /// Verify credentials against an existing API implementation.
    pub async fn connect(api: Arc<dyn ServerApi>, config: &ProviderConfig) -> Result<Self> {
        let account = api.get_account().await.map_err(Error::Authentication)?;

        info!(
            username = %account.username,
            base_url = %config.client.base_url,
            request_timeout_secs = config.client.request_timeout.as_secs(),
            retry_max = config.client.retry_max,
            "upcloud service connection configured"
        );

        Ok(Self { api })
    }

    pub fn server_resource(&self) -> ServerResource {
        ServerResource::new(self.api.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeApi};

    #[test]
    fn invalid_zone_lists_alternatives() {
        let err = Error::InvalidZone {
            zone: "xx-nowhere1".into(),
            available: vec!["fi-hel1".into(), "de-fra1".into()],
        };
        assert_eq!(
            err.to_string(),
            "expected zone to be one of [fi-hel1, de-fra1], got xx-nowhere1"
        );
    }

    #[test]
    fn precondition_message_names_states() {
        let err = Error::Precondition {
            uuid: "abc".into(),
            action: "alter network interfaces",
            required: ServerState::Stopped,
            actual: ServerState::Started,
        };
        assert_eq!(
            err.to_string(),
            "server abc must be stopped to alter network interfaces, but is started"
        );
    }

    #[test]
    fn not_found_is_seen_through_partial_apply() {
        let inner = Error::Remote {
            operation: "read server details",
            source: upcloud_api::Error::Api {
                endpoint: "get server details",
                status: upcloud_api::StatusCode::NOT_FOUND,
                body: String::new(),
            },
        };
        let err = Error::partial("start server")(inner);
        assert!(err.is_not_found());
        assert!(!Error::Validation("x".into()).is_not_found());
    }

    #[tokio::test]
    async fn connect_checks_credentials() {
        let api = Arc::new(FakeApi::new());
        let provider = Provider::connect(api.clone(), &ProviderConfig::new("user", "secret"))
            .await
            .unwrap();
        assert_eq!(api.calls(), vec![Call::GetAccount]);

        let _resource = provider.server_resource();
    }

    #[tokio::test]
    async fn connect_reports_rejected_credentials() {
        let api = Arc::new(FakeApi::new().fail_on(Call::GetAccount));
        let err = Provider::connect(api, &ProviderConfig::new("user", "wrong"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Authentication(_)));
    }
}
