//! Create, read, update and delete for the `upcloud_server` resource.

use std::sync::Arc;

use tracing::{debug, info, warn};
use upcloud_api::{
    CreateServerRequest, CreateServerStorageDevice, ModifyServerRequest, ServerState,
    StorageDeviceList,
};

use crate::interfaces::{build_interface_requests, build_server_networking, reconcile_interfaces};
use crate::power::{ensure_started, ensure_stopped};
use crate::types::{NetworkInterfaceModel, ServerModel};
use crate::zones::validate_zone;
use crate::{Error, Result, ServerApi};

pub const TYPE_NAME: &str = "upcloud_server";

/// Ubuntu 24.04 public template every server boots from.
pub const DEFAULT_STORAGE_TEMPLATE: &str = "01000000-0000-4000-8000-000030240200";
const DEFAULT_STORAGE_TITLE: &str = "Ubuntu-24-04-LTS";
const DEFAULT_STORAGE_SIZE_GB: u32 = 20;
const DEFAULT_STORAGE_TIER: &str = "maxiops";

fn server_title(hostname: &str) -> String {
    format!("{hostname} (managed by upcloud-provider)")
}

/// Interfaces can only be reconfigured while the server is stopped, so any
/// change to their count or to a positional address family needs a power
/// cycle.
pub fn requires_network_reconfiguration(
    prior: &[NetworkInterfaceModel],
    planned: &[NetworkInterfaceModel],
) -> bool {
    prior.len() != planned.len()
        || prior
            .iter()
            .zip(planned)
            .any(|(a, b)| a.ip_address_family != b.ip_address_family)
}

#[derive(Clone)]
pub struct ServerResource {
    api: Arc<dyn ServerApi>,
}

impl ServerResource {
    pub fn new(api: Arc<dyn ServerApi>) -> Self {
        Self { api }
    }

    pub async fn create(&self, planned: ServerModel) -> Result<ServerModel> {
        planned.validate()?;
        validate_zone(self.api.as_ref(), &planned.zone).await?;

        let req = CreateServerRequest {
            zone: planned.zone.clone(),
            title: server_title(&planned.hostname),
            hostname: planned.hostname.clone(),
            metadata: true,
            storage_devices: StorageDeviceList {
                storage_device: vec![CreateServerStorageDevice {
                    action: "clone".into(),
                    storage: DEFAULT_STORAGE_TEMPLATE.into(),
                    title: DEFAULT_STORAGE_TITLE.into(),
                    size: DEFAULT_STORAGE_SIZE_GB,
                    tier: DEFAULT_STORAGE_TIER.into(),
                }],
            },
            networking: build_server_networking(&planned.network_interfaces),
        };

        let created = self
            .api
            .create_server(&req)
            .await
            .map_err(Error::remote("create server"))?;
        info!(
            server_uuid = %created.uuid,
            hostname = %created.hostname,
            zone = %created.zone,
            "upcloud: server created"
        );

        let details = self
            .api
            .wait_for_server_state(&created.uuid, ServerState::Started)
            .await
            .map_err(Error::remote("wait for server to start"))?;

        let mut state = planned;
        state.merge_observed(&details);
        Ok(state)
    }

    /// Refresh `state` from the API. A missing server is an error; callers
    /// that want to drop it from tracking can check [`Error::is_not_found`].
    pub async fn read(&self, state: &mut ServerModel) -> Result<()> {
        let uuid = state.id()?.to_string();
        let details = self
            .api
            .get_server_details(&uuid)
            .await
            .map_err(Error::remote("read server details"))?;

        debug!(server_uuid = %uuid, state = %details.state, "upcloud: server read");
        state.merge_observed(&details);
        Ok(())
    }

    /// Apply `planned` over `prior`.
    ///
    /// Steps after the server has been stopped are reported as
    /// [`Error::PartialApply`]; nothing already applied is rolled back.
    pub async fn update(&self, prior: &ServerModel, planned: ServerModel) -> Result<ServerModel> {
        planned.validate()?;

        let uuid = match planned.id.as_deref() {
            Some(id) => id.to_string(),
            None => prior.id()?.to_string(),
        };
        if planned.zone != prior.zone {
            return Err(Error::Validation(format!(
                "zone cannot change in place ({} -> {}); the server must be replaced",
                prior.zone, planned.zone
            )));
        }

        let api = self.api.as_ref();
        let reconfigure =
            requires_network_reconfiguration(&prior.network_interfaces, &planned.network_interfaces);
        let rename = planned.hostname != prior.hostname;

        if reconfigure {
            ensure_stopped(api, &uuid)
                .await
                .map_err(Error::partial("stop server"))?;

            let desired = build_interface_requests(&planned.network_interfaces);
            let report = reconcile_interfaces(api, &uuid, &desired)
                .await
                .map_err(Error::partial("reconcile network interfaces"))?;
            info!(
                server_uuid = %uuid,
                preserved = ?report.preserved,
                deleted = ?report.deleted,
                created = ?report.created,
                "upcloud: network interfaces reconciled"
            );
        }

        if rename {
            let modified = self.modify_hostname(&uuid, &planned.hostname).await;
            if reconfigure {
                modified.map_err(Error::partial("modify server"))?;
            } else {
                modified?;
            }
        }

        if reconfigure {
            ensure_started(api, &uuid)
                .await
                .map_err(Error::partial("start server"))?;
        }

        let details = api
            .get_server_details(&uuid)
            .await
            .map_err(Error::remote("read server details"))?;

        let mut state = planned;
        state.merge_observed(&details);
        Ok(state)
    }

    async fn modify_hostname(&self, uuid: &str, hostname: &str) -> Result<()> {
        let req = ModifyServerRequest {
            hostname: Some(hostname.to_string()),
            title: Some(server_title(hostname)),
        };
        self.api
            .modify_server(uuid, &req)
            .await
            .map_err(Error::remote("modify server"))?;

        info!(server_uuid = %uuid, hostname, "upcloud: server hostname modified");
        Ok(())
    }

    /// Stop the server if needed, then delete it with its storages.
    pub async fn delete(&self, state: ServerModel) -> Result<()> {
        let uuid = state.id()?;
        let api = self.api.as_ref();

        if let Err(e) = ensure_stopped(api, uuid).await {
            if e.is_not_found() {
                warn!(server_uuid = %uuid, "upcloud: server already deleted");
                return Ok(());
            }
            return Err(e);
        }

        match api.delete_server_and_storages(uuid).await {
            Ok(()) => {
                info!(server_uuid = %uuid, "upcloud: server deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(server_uuid = %uuid, "upcloud: server already deleted");
                Ok(())
            }
            Err(e) => Err(Error::Remote {
                operation: "delete server",
                source: e,
            }),
        }
    }

    /// Start tracking an existing server; a following [`read`](Self::read)
    /// fills in the rest.
    pub fn import_state(&self, id: impl Into<String>) -> ServerModel {
        ServerModel {
            id: Some(id.into()),
            ..ServerModel::default()
        }
    }
}
