//! Network interface reconciliation.
//!
//! Interfaces are addressed by their 1-based index on the server. A desired
//! interface that is equivalent to the observed one at the same position is
//! left untouched so its public address and MAC survive the update; every
//! other observed interface is deleted and every non-preserved desired
//! interface is created. The server must be stopped for the whole pass.

use std::collections::HashSet;

use tracing::info;
use upcloud_api::{
    CreateIpAddress, CreateIpAddressList, CreateNetworkInterfaceRequest, CreateServerInterface,
    CreateServerInterfaceList, CreateServerNetworking, ServerInterface, ServerState,
};

use crate::types::NetworkInterfaceModel;
use crate::{Error, Result, ServerApi};

/// Outcome of a reconciliation pass, as remote interface indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub preserved: Vec<u32>,
    pub deleted: Vec<u32>,
    pub created: Vec<u32>,
}

/// Requests for attaching `interfaces` to an existing server; position `i`
/// becomes index `i + 1`.
pub fn build_interface_requests(
    interfaces: &[NetworkInterfaceModel],
) -> Vec<CreateNetworkInterfaceRequest> {
    interfaces
        .iter()
        .zip(1..)
        .map(|(iface, index)| CreateNetworkInterfaceRequest {
            index,
            interface_type: iface.interface_type,
            // Public addresses and networks are assigned by UpCloud.
            network: None,
            ip_addresses: CreateIpAddressList {
                ip_address: vec![CreateIpAddress {
                    family: iface.ip_address_family,
                    address: None,
                }],
            },
            source_ip_filtering: iface.source_ip_filtering,
            bootable: iface.bootable,
        })
        .collect()
}

/// Interface set for a create-server request.
pub fn build_server_networking(interfaces: &[NetworkInterfaceModel]) -> CreateServerNetworking {
    CreateServerNetworking {
        interfaces: CreateServerInterfaceList {
            interface: interfaces
                .iter()
                .map(|iface| CreateServerInterface {
                    ip_addresses: CreateIpAddressList {
                        ip_address: vec![CreateIpAddress {
                            family: iface.ip_address_family,
                            address: None,
                        }],
                    },
                    interface_type: iface.interface_type,
                    network: iface.network.clone(),
                    source_ip_filtering: iface.source_ip_filtering,
                    bootable: iface.bootable,
                })
                .collect(),
        },
    }
}

/// Partial equality deciding whether an observed interface can be kept as is.
///
/// Type and index must match and both sides must carry exactly one address
/// of the same family. Address values and MAC are ignored: both are assigned
/// by the API and are expected to differ from anything in the request.
pub fn interfaces_equivalent(
    observed: &ServerInterface,
    desired: &CreateNetworkInterfaceRequest,
) -> bool {
    if observed.interface_type != desired.interface_type || observed.index != desired.index {
        return false;
    }

    match (observed.ip_addresses(), desired.ip_addresses()) {
        ([a], [b]) => a.family == b.family,
        _ => false,
    }
}

/// Bring the interfaces of a stopped server in line with `desired`.
///
/// Deletes run before creates and both stop at the first failure; nothing
/// already applied is undone.
pub async fn reconcile_interfaces(
    api: &dyn ServerApi,
    server_uuid: &str,
    desired: &[CreateNetworkInterfaceRequest],
) -> Result<ReconcileReport> {
    let details = api
        .get_server_details(server_uuid)
        .await
        .map_err(Error::remote("read server details"))?;

    if details.state != ServerState::Stopped {
        return Err(Error::Precondition {
            uuid: server_uuid.to_string(),
            action: "alter network interfaces",
            required: ServerState::Stopped,
            actual: details.state,
        });
    }

    let mut report = ReconcileReport::default();
    let mut preserved = HashSet::new();

    for (i, observed) in details.interfaces().iter().enumerate() {
        if desired
            .get(i)
            .is_some_and(|want| interfaces_equivalent(observed, want))
        {
            preserved.insert(observed.index);
            report.preserved.push(observed.index);
            continue;
        }

        api.delete_network_interface(server_uuid, observed.index)
            .await
            .map_err(|source| Error::Interface {
                operation: "delete",
                index: observed.index,
                source,
            })?;
        info!(server_uuid, index = observed.index, "upcloud: network interface deleted");
        report.deleted.push(observed.index);
    }

    for want in desired {
        if preserved.contains(&want.index) {
            continue;
        }

        api.create_network_interface(server_uuid, want)
            .await
            .map_err(|source| Error::Interface {
                operation: "create",
                index: want.index,
                source,
            })?;
        info!(
            server_uuid,
            index = want.index,
            family = ?want.ip_addresses().first().map(|a| a.family),
            "upcloud: network interface created"
        );
        report.created.push(want.index);
    }

    Ok(report)
}
