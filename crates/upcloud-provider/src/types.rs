use serde::{Deserialize, Serialize};
use upcloud_api::{IpAddressFamily, NetworkType, ServerDetails};

use crate::{Error, Result};

pub const HOSTNAME_MAX_LEN: usize = 128;

/// Tracked state of one server resource, as exchanged with the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerModel {
    /// Server UUID; unknown until the server is created or imported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub hostname: String,
    /// Changing the zone of an existing server forces replacement.
    pub zone: String,
    /// Position `i` maps to remote interface index `i + 1`.
    #[serde(rename = "network_interface", default)]
    pub network_interfaces: Vec<NetworkInterfaceModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceModel {
    #[serde(default)]
    pub ip_address_family: IpAddressFamily,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub ip_address_floating: Option<bool>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(rename = "type", default)]
    pub interface_type: NetworkType,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default = "default_source_ip_filtering")]
    pub source_ip_filtering: bool,
    #[serde(default)]
    pub bootable: bool,
}

fn default_source_ip_filtering() -> bool {
    true
}

impl Default for NetworkInterfaceModel {
    fn default() -> Self {
        Self {
            ip_address_family: IpAddressFamily::IPv4,
            ip_address: None,
            ip_address_floating: None,
            mac_address: None,
            interface_type: NetworkType::Public,
            network: None,
            source_ip_filtering: default_source_ip_filtering(),
            bootable: false,
        }
    }
}

impl NetworkInterfaceModel {
    /// A public interface of the given family with every other attribute
    /// at its default.
    pub fn public(family: IpAddressFamily) -> Self {
        Self {
            ip_address_family: family,
            ..Self::default()
        }
    }
}

impl ServerModel {
    pub fn new(
        hostname: impl Into<String>,
        zone: impl Into<String>,
        network_interfaces: Vec<NetworkInterfaceModel>,
    ) -> Self {
        Self {
            id: None,
            hostname: hostname.into(),
            zone: zone.into(),
            network_interfaces,
        }
    }

    pub fn id(&self) -> Result<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| Error::Validation("server id is unknown; create or import the server first".into()))
    }

    /// Local shape checks on user configuration. Zone existence is checked
    /// separately against the remote catalog.
    pub fn validate(&self) -> Result<()> {
        let hostname_len = self.hostname.chars().count();
        if !(1..=HOSTNAME_MAX_LEN).contains(&hostname_len) {
            return Err(Error::Validation(format!(
                "hostname must be between 1 and {HOSTNAME_MAX_LEN} characters, got {hostname_len}"
            )));
        }

        if self.zone.is_empty() {
            return Err(Error::Validation("zone must not be empty".into()));
        }

        if self.network_interfaces.is_empty() {
            return Err(Error::Validation(
                "at least one network_interface is required".into(),
            ));
        }

        for (i, iface) in self.network_interfaces.iter().enumerate() {
            if iface.interface_type != NetworkType::Public {
                return Err(Error::Validation(format!(
                    "network_interface #{}: type must be public, got {}",
                    i + 1,
                    iface.interface_type
                )));
            }
            // UpCloud fixes both for public interfaces.
            if !iface.source_ip_filtering {
                return Err(Error::Validation(format!(
                    "network_interface #{}: source_ip_filtering cannot be disabled on a public interface",
                    i + 1
                )));
            }
            if iface.bootable {
                return Err(Error::Validation(format!(
                    "network_interface #{}: a public interface cannot be bootable",
                    i + 1
                )));
            }
        }

        Ok(())
    }

    /// Overwrite tracked values with what the API reports, including the
    /// whole interface list.
    pub fn merge_observed(&mut self, details: &ServerDetails) {
        self.id = Some(details.uuid.clone());
        self.hostname = details.hostname.clone();
        self.zone = details.zone.clone();

        self.network_interfaces = details
            .interfaces()
            .iter()
            .map(|iface| {
                let mut model = NetworkInterfaceModel {
                    ip_address_family: IpAddressFamily::default(),
                    ip_address: None,
                    ip_address_floating: None,
                    mac_address: Some(iface.mac.clone()),
                    interface_type: iface.interface_type,
                    network: (!iface.network.is_empty()).then(|| iface.network.clone()),
                    source_ip_filtering: iface.source_ip_filtering,
                    bootable: iface.bootable,
                };

                // Only the primary address is tracked; with several, the last one wins.
                if let Some(ip) = iface.ip_addresses().last() {
                    model.ip_address_family = ip.family;
                    model.ip_address = ip.address.clone();
                    model.ip_address_floating = Some(ip.floating);
                }

                model
            })
            .collect();
    }
}
