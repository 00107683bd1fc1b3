use std::fmt;

use serde::{Deserialize, Serialize};

/// UpCloud encodes booleans as `"yes"` / `"no"` strings.
pub(crate) mod yes_no {
    use serde::de::{Error, Unexpected};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(if *value { "yes" } else { "no" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(d)?;
        match raw.as_str() {
            "yes" => Ok(true),
            "no" => Ok(false),
            other => Err(D::Error::invalid_value(
                Unexpected::Str(other),
                &"\"yes\" or \"no\"",
            )),
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpAddressFamily {
    #[default]
    #[serde(rename = "IPv4")]
    IPv4,
    #[serde(rename = "IPv6")]
    IPv6,
}

impl IpAddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IPv4 => "IPv4",
            Self::IPv6 => "IPv6",
        }
    }
}

impl fmt::Display for IpAddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    #[default]
    Public,
    Utility,
    Private,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Utility => "utility",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server run state as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Started,
    Stopped,
    Maintenance,
    Error,
    #[serde(other)]
    Unknown,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Maintenance => "maintenance",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Server details ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub family: IpAddressFamily,
    #[serde(default, with = "yes_no")]
    pub floating: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpAddressList {
    #[serde(default)]
    pub ip_address: Vec<IpAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInterface {
    pub index: u32,
    #[serde(default)]
    pub ip_addresses: IpAddressList,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub network: String,
    #[serde(rename = "type")]
    pub interface_type: NetworkType,
    #[serde(default, with = "yes_no")]
    pub source_ip_filtering: bool,
    #[serde(default, with = "yes_no")]
    pub bootable: bool,
}

impl ServerInterface {
    pub fn ip_addresses(&self) -> &[IpAddress] {
        &self.ip_addresses.ip_address
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceList {
    #[serde(default)]
    pub interface: Vec<ServerInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Networking {
    #[serde(default)]
    pub interfaces: InterfaceList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDetails {
    pub uuid: String,
    pub hostname: String,
    pub zone: String,
    pub state: ServerState,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub networking: Networking,
}

impl ServerDetails {
    /// Interfaces in the order the API reports them.
    pub fn interfaces(&self) -> &[ServerInterface] {
        &self.networking.interfaces.interface
    }
}

// ── Create server ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateServerRequest {
    pub zone: String,
    pub title: String,
    pub hostname: String,
    #[serde(with = "yes_no")]
    pub metadata: bool,
    pub storage_devices: StorageDeviceList,
    pub networking: CreateServerNetworking,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageDeviceList {
    pub storage_device: Vec<CreateServerStorageDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateServerStorageDevice {
    pub action: String,
    pub storage: String,
    pub title: String,
    pub size: u32,
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateServerNetworking {
    pub interfaces: CreateServerInterfaceList,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateServerInterfaceList {
    pub interface: Vec<CreateServerInterface>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateServerInterface {
    pub ip_addresses: CreateIpAddressList,
    #[serde(rename = "type")]
    pub interface_type: NetworkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(with = "yes_no")]
    pub source_ip_filtering: bool,
    #[serde(with = "yes_no")]
    pub bootable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateIpAddress {
    pub family: IpAddressFamily,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateIpAddressList {
    pub ip_address: Vec<CreateIpAddress>,
}

// ── Interfaces ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateNetworkInterfaceRequest {
    pub index: u32,
    #[serde(rename = "type")]
    pub interface_type: NetworkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub ip_addresses: CreateIpAddressList,
    #[serde(with = "yes_no")]
    pub source_ip_filtering: bool,
    #[serde(with = "yes_no")]
    pub bootable: bool,
}

impl CreateNetworkInterfaceRequest {
    pub fn ip_addresses(&self) -> &[CreateIpAddress] {
        &self.ip_addresses.ip_address
    }
}

// ── Modify / power ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModifyServerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopServerRequest {
    pub stop_type: StopType,
    /// Seconds before a soft stop escalates to a hard stop.
    pub timeout: String,
}

impl Default for StopServerRequest {
    fn default() -> Self {
        Self {
            stop_type: StopType::Soft,
            timeout: "60".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    Soft,
    Hard,
}

// ── Catalog / account ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "yes_no")]
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    #[serde(default)]
    pub credits: f64,
}

// ── Response envelopes ───────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct ServerEnvelope {
    pub server: ServerDetails,
}

#[derive(Deserialize)]
pub(crate) struct InterfaceEnvelope {
    pub interface: ServerInterface,
}

#[derive(Deserialize)]
pub(crate) struct ZonesEnvelope {
    pub zones: ZoneList,
}

#[derive(Deserialize)]
pub(crate) struct ZoneList {
    #[serde(default)]
    pub zone: Vec<Zone>,
}

#[derive(Deserialize)]
pub(crate) struct AccountEnvelope {
    pub account: Account,
}
