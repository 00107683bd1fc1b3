//! In-memory `ServerApi` that records every call.

use std::sync::Mutex;

use async_trait::async_trait;
use upcloud_api::{
    Account, CreateNetworkInterfaceRequest, CreateServerRequest, InterfaceList, IpAddress,
    IpAddressFamily, IpAddressList, ModifyServerRequest, NetworkType, Networking, ServerDetails,
    ServerInterface, ServerState, StatusCode, Zone,
};

use crate::ServerApi;

pub(crate) const UUID: &str = "00798b85-efdc-41ca-8021-f6ef457b8531";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    GetServerDetails,
    CreateServer,
    ModifyServer(String),
    DeleteServer,
    CreateInterface(u32, IpAddressFamily),
    DeleteInterface(u32),
    StopServer,
    StartServer,
    WaitForState(ServerState),
    GetZones,
    GetAccount,
}

impl Call {
    fn is_read(&self) -> bool {
        matches!(
            self,
            Self::GetServerDetails | Self::WaitForState(_) | Self::GetZones | Self::GetAccount
        )
    }
}

pub(crate) fn observed_interface(index: u32, family: IpAddressFamily) -> ServerInterface {
    let address = match family {
        IpAddressFamily::IPv4 => format!("94.237.0.{index}"),
        IpAddressFamily::IPv6 => format!("2a04:3540:1000:310::{index:x}"),
    };
    ServerInterface {
        index,
        ip_addresses: IpAddressList {
            ip_address: vec![IpAddress {
                address: Some(address),
                family,
                floating: false,
            }],
        },
        mac: format!("de:ff:ff:ff:00:{index:02x}"),
        network: format!("03000000-0000-4000-8000-00000000000{index}"),
        interface_type: NetworkType::Public,
        source_ip_filtering: true,
        bootable: false,
    }
}

pub(crate) fn observed_server(state: ServerState, families: &[IpAddressFamily]) -> ServerDetails {
    ServerDetails {
        uuid: UUID.into(),
        hostname: "web1".into(),
        zone: "fi-hel1".into(),
        state,
        title: "web1 (managed by upcloud-provider)".into(),
        networking: Networking {
            interfaces: InterfaceList {
                interface: families
                    .iter()
                    .zip(1..)
                    .map(|(family, index)| observed_interface(index, *family))
                    .collect(),
            },
        },
    }
}

#[derive(Default)]
struct Inner {
    server: Option<ServerDetails>,
    zones: Vec<Zone>,
    calls: Vec<Call>,
    failing: Vec<Call>,
    last_create: Option<CreateServerRequest>,
}

pub(crate) struct FakeApi {
    inner: Mutex<Inner>,
}

impl FakeApi {
    /// No server exists yet; two zones are available.
    pub fn new() -> Self {
        let zones = ["fi-hel1", "de-fra1"]
            .into_iter()
            .map(|id| Zone {
                id: id.into(),
                description: String::new(),
                public: true,
            })
            .collect();

        Self {
            inner: Mutex::new(Inner {
                zones,
                ..Inner::default()
            }),
        }
    }

    pub fn with_server(state: ServerState, families: &[IpAddressFamily]) -> Self {
        let api = Self::new();
        api.inner.lock().unwrap().server = Some(observed_server(state, families));
        api
    }

    /// Make the given call fail with an HTTP 500 once it is reached.
    pub fn fail_on(self, call: Call) -> Self {
        self.inner.lock().unwrap().failing.push(call);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Calls that change remote state, in order.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| !c.is_read()).collect()
    }

    pub fn server(&self) -> Option<ServerDetails> {
        self.inner.lock().unwrap().server.clone()
    }

    pub fn last_create(&self) -> Option<CreateServerRequest> {
        self.inner.lock().unwrap().last_create.clone()
    }

    fn record(inner: &mut Inner, call: Call) -> upcloud_api::Result<()> {
        let fails = inner.failing.contains(&call);
        inner.calls.push(call);
        if fails {
            return Err(upcloud_api::Error::Api {
                endpoint: "fake",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn existing(inner: &mut Inner) -> upcloud_api::Result<&mut ServerDetails> {
        inner.server.as_mut().ok_or(upcloud_api::Error::Api {
            endpoint: "fake",
            status: StatusCode::NOT_FOUND,
            body: "SERVER_NOT_FOUND".into(),
        })
    }
}

#[async_trait]
impl ServerApi for FakeApi {
    async fn get_server_details(&self, _uuid: &str) -> upcloud_api::Result<ServerDetails> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, Call::GetServerDetails)?;
        Self::existing(&mut inner).map(|s| s.clone())
    }

    async fn create_server(&self, req: &CreateServerRequest) -> upcloud_api::Result<ServerDetails> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, Call::CreateServer)?;

        let families: Vec<_> = req
            .networking
            .interfaces
            .interface
            .iter()
            .map(|iface| iface.ip_addresses.ip_address[0].family)
            .collect();
        let mut server = observed_server(ServerState::Started, &families);
        server.hostname = req.hostname.clone();
        server.zone = req.zone.clone();
        server.title = req.title.clone();

        inner.last_create = Some(req.clone());
        inner.server = Some(server.clone());
        Ok(server)
    }

    async fn modify_server(
        &self,
        _uuid: &str,
        req: &ModifyServerRequest,
    ) -> upcloud_api::Result<ServerDetails> {
        let mut inner = self.inner.lock().unwrap();
        let hostname = req.hostname.clone().unwrap_or_default();
        Self::record(&mut inner, Call::ModifyServer(hostname.clone()))?;

        let server = Self::existing(&mut inner)?;
        server.hostname = hostname;
        Ok(server.clone())
    }

    async fn delete_server_and_storages(&self, _uuid: &str) -> upcloud_api::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, Call::DeleteServer)?;
        Self::existing(&mut inner)?;
        inner.server = None;
        Ok(())
    }

    async fn create_network_interface(
        &self,
        _uuid: &str,
        req: &CreateNetworkInterfaceRequest,
    ) -> upcloud_api::Result<ServerInterface> {
        let mut inner = self.inner.lock().unwrap();
        let family = req
            .ip_addresses()
            .first()
            .map(|a| a.family)
            .unwrap_or_default();
        Self::record(&mut inner, Call::CreateInterface(req.index, family))?;

        let created = observed_interface(req.index, family);
        let interfaces = &mut Self::existing(&mut inner)?.networking.interfaces.interface;
        interfaces.push(created.clone());
        interfaces.sort_by_key(|iface| iface.index);
        Ok(created)
    }

    async fn delete_network_interface(&self, _uuid: &str, index: u32) -> upcloud_api::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, Call::DeleteInterface(index))?;

        let interfaces = &mut Self::existing(&mut inner)?.networking.interfaces.interface;
        interfaces.retain(|iface| iface.index != index);
        Ok(())
    }

    async fn stop_server(&self, _uuid: &str) -> upcloud_api::Result<ServerDetails> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, Call::StopServer)?;

        let server = Self::existing(&mut inner)?;
        server.state = ServerState::Stopped;
        Ok(server.clone())
    }

    async fn start_server(&self, _uuid: &str) -> upcloud_api::Result<ServerDetails> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, Call::StartServer)?;

        let server = Self::existing(&mut inner)?;
        server.state = ServerState::Started;
        Ok(server.clone())
    }

    async fn wait_for_server_state(
        &self,
        uuid: &str,
        desired: ServerState,
    ) -> upcloud_api::Result<ServerDetails> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, Call::WaitForState(desired))?;

        let server = Self::existing(&mut inner)?;
        if server.state != desired {
            return Err(upcloud_api::Error::Timeout {
                uuid: uuid.to_string(),
                state: desired,
            });
        }
        Ok(server.clone())
    }

    async fn get_zones(&self) -> upcloud_api::Result<Vec<Zone>> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, Call::GetZones)?;
        Ok(inner.zones.clone())
    }

    async fn get_account(&self) -> upcloud_api::Result<Account> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, Call::GetAccount)?;
        Ok(Account {
            username: "user".into(),
            credits: 10_000.0,
        })
    }
}
