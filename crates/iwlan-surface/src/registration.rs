//! Network-registration surface: `requestNetworkRegistrationInfo` for the
//! PS domain only, plus `networkRegistrationInfoChanged` on the
//! transitions.

/// Only the packet-switched domain is supported ("Any other
/// domain is rejected as unsupported").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Ps,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Home,
    NotRegisteredSearching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkRegistrationInfo {
    pub registration_state: RegistrationState,
    pub emergency_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported domain")]
pub struct UnsupportedDomain;

pub(crate) fn build(wifi_connected: bool, subscription_active: bool) -> NetworkRegistrationInfo {
    NetworkRegistrationInfo {
        registration_state: if wifi_connected {
            RegistrationState::Home
        } else {
            RegistrationState::NotRegisteredSearching
        },
        emergency_only: !subscription_active,
    }
}
