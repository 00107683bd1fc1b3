//! Planned state for a server before it is applied.
//!
//! Computed attributes carry their last known value forward unless the
//! configured attribute they depend on changed, in which case they become
//! unknown until the API assigns new ones.

use std::fmt;

use crate::types::{NetworkInterfaceModel, ServerModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Create,
    Update,
    /// Destroy and recreate; the zone of a server cannot change in place.
    Replace,
    NoOp,
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Replace => write!(f, "replace"),
            Self::NoOp => write!(f, "no-op"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedServer {
    pub action: PlannedAction,
    pub state: ServerModel,
}

type ComputedSlot = fn(&mut NetworkInterfaceModel) -> &mut Option<String>;

fn ip_address(iface: &mut NetworkInterfaceModel) -> &mut Option<String> {
    &mut iface.ip_address
}

fn mac_address(iface: &mut NetworkInterfaceModel) -> &mut Option<String> {
    &mut iface.mac_address
}

fn network(iface: &mut NetworkInterfaceModel) -> &mut Option<String> {
    &mut iface.network
}

/// Computed interface attributes invalidated by an `ip_address_family` change.
const FAMILY_DEPENDENT: &[ComputedSlot] = &[ip_address, mac_address, network];

pub fn plan_server(prior: Option<&ServerModel>, config: &ServerModel) -> PlannedServer {
    let mut state = config.clone();

    let Some(prior) = prior else {
        return PlannedServer {
            action: PlannedAction::Create,
            state,
        };
    };

    if state.id.is_none() {
        state.id = prior.id.clone();
    }
    carry_computed_attributes(prior, &mut state);

    let action = if prior.zone != state.zone {
        PlannedAction::Replace
    } else if configuration_differs(prior, &state) {
        PlannedAction::Update
    } else {
        PlannedAction::NoOp
    };

    PlannedServer { action, state }
}

/// Pre-apply pass over interface positions present in both `prior` and
/// `planned`: each family-dependent attribute left unset by configuration
/// takes its prior value, or stays unknown when the family changed.
pub fn carry_computed_attributes(prior: &ServerModel, planned: &mut ServerModel) {
    for (planned_iface, prior_iface) in planned
        .network_interfaces
        .iter_mut()
        .zip(&prior.network_interfaces)
    {
        let family_changed = planned_iface.ip_address_family != prior_iface.ip_address_family;
        let mut prior_iface = prior_iface.clone();

        for slot in FAMILY_DEPENDENT.iter().copied() {
            let planned_value = slot(&mut *planned_iface);
            if planned_value.is_some() {
                continue;
            }
            *planned_value = if family_changed {
                None
            } else {
                slot(&mut prior_iface).take()
            };
        }

        if planned_iface.ip_address_floating.is_none() {
            planned_iface.ip_address_floating = prior_iface.ip_address_floating;
        }
    }
}

fn configuration_differs(prior: &ServerModel, planned: &ServerModel) -> bool {
    if prior.hostname != planned.hostname
        || prior.network_interfaces.len() != planned.network_interfaces.len()
    {
        return true;
    }

    prior
        .network_interfaces
        .iter()
        .zip(&planned.network_interfaces)
        .any(|(a, b)| {
            a.ip_address_family != b.ip_address_family
                || a.interface_type != b.interface_type
                || a.source_ip_filtering != b.source_ip_filtering
                || a.bootable != b.bootable
        })
}

#[cfg(test)]
mod tests {
    use upcloud_api::{IpAddressFamily, ServerState};

    use super::*;
    use crate::testing::{UUID, observed_server};

    use IpAddressFamily::{IPv4, IPv6};

    fn prior(families: &[IpAddressFamily]) -> ServerModel {
        let mut model = ServerModel::default();
        model.merge_observed(&observed_server(ServerState::Started, families));
        model
    }

    fn config(hostname: &str, zone: &str, families: &[IpAddressFamily]) -> ServerModel {
        ServerModel::new(
            hostname,
            zone,
            families
                .iter()
                .map(|f| NetworkInterfaceModel::public(*f))
                .collect(),
        )
    }

    #[test]
    fn no_prior_state_plans_create() {
        let planned = plan_server(None, &config("web1", "fi-hel1", &[IPv4]));
        assert_eq!(planned.action, PlannedAction::Create);
        assert_eq!(planned.state.id, None);
    }

    #[test]
    fn unchanged_configuration_is_noop_and_keeps_computed_values() {
        let prior = prior(&[IPv4, IPv6]);
        let planned = plan_server(Some(&prior), &config("web1", "fi-hel1", &[IPv4, IPv6]));

        assert_eq!(planned.action, PlannedAction::NoOp);
        assert_eq!(planned.state, prior);
    }

    #[test]
    fn family_change_resets_dependent_values() {
        let prior = prior(&[IPv4, IPv4]);
        let planned = plan_server(Some(&prior), &config("web1", "fi-hel1", &[IPv4, IPv6]));

        assert_eq!(planned.action, PlannedAction::Update);
        assert_eq!(planned.state.id.as_deref(), Some(UUID));

        let kept = &planned.state.network_interfaces[0];
        assert_eq!(kept.ip_address, prior.network_interfaces[0].ip_address);
        assert_eq!(kept.mac_address, prior.network_interfaces[0].mac_address);
        assert_eq!(kept.network, prior.network_interfaces[0].network);

        let reset = &planned.state.network_interfaces[1];
        assert_eq!(reset.ip_address, None);
        assert_eq!(reset.mac_address, None);
        assert_eq!(reset.network, None);
    }

    #[test]
    fn added_interfaces_stay_unknown() {
        let prior = prior(&[IPv4]);
        let planned = plan_server(Some(&prior), &config("web1", "fi-hel1", &[IPv4, IPv4]));

        assert_eq!(planned.action, PlannedAction::Update);
        assert_eq!(planned.state.network_interfaces[1].ip_address, None);
        assert_eq!(planned.state.network_interfaces[1].ip_address_floating, None);
    }

    #[test]
    fn hostname_change_plans_update() {
        let prior = prior(&[IPv4]);
        let planned = plan_server(Some(&prior), &config("web2", "fi-hel1", &[IPv4]));
        assert_eq!(planned.action, PlannedAction::Update);
    }

    #[test]
    fn zone_change_forces_replacement() {
        let prior = prior(&[IPv4]);
        let planned = plan_server(Some(&prior), &config("web2", "de-fra1", &[IPv4]));
        assert_eq!(planned.action, PlannedAction::Replace);
        assert_eq!(planned.action.to_string(), "replace");
    }
}
