//! Shared data model for the iWLAN control plane: APN identity, the
//! tunnel/error-policy record shapes, the closed error and event
//! vocabularies, and the ePDG endpoint/data-call response types that cross
//! crate boundaries.
//!
//! Internal mutable state (the live `TunnelRecord` map in the tunnel
//! manager, the live `ErrorPolicyRecord` map in the error engine) is owned
//! by the crate that mutates it; only the immutable, `Serialize`-able
//! projections needed by callers live here.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod event;
mod fail_cause;

pub use event::Event;
pub use fail_cause::FailCause;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Opaque, case-sensitive APN identifier (e.g. `"ims"`, `"mms"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApnId(String);

impl ApnId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `hash(apn)` used as the platform-facing data-call id (`cid`).
    ///
    /// Stable across process lifetime for a given APN string; used to find
    /// the APN that owns a `cid` in `deactivateDataCall`.
    pub fn call_id(&self) -> i32 {
        use std::hash::{Hash, Hasher};

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.0.hash(&mut hasher);
        hasher.finish() as i32
    }
}

impl fmt::Display for ApnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ApnId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ApnId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// IP protocol family requested for a tunnel, or accepted by the selector's
/// `protocolFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolFamily {
    Ipv4,
    Ipv6,
    Ipv4v6,
}

impl ProtocolFamily {
    pub fn accepts(&self, addr: IpAddr) -> bool {
        match (self, addr) {
            (ProtocolFamily::Ipv4, IpAddr::V4(_)) => true,
            (ProtocolFamily::Ipv6, IpAddr::V6(_)) => true,
            (ProtocolFamily::Ipv4v6, _) => true,
            _ => false,
        }
    }
}

/// Why a tunnel is being brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpReason {
    Normal,
    Handover,
}

/// Radio access network a `setupDataCall` request is scoped to. Only
/// `Iwlan` is ever accepted by the Tunnel Lifecycle Manager; the others
/// exist because the platform's call carries the same field for every RAT
/// and routes non-IWLAN requests here regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessNetworkType {
    Iwlan,
    Eutran,
    Utran,
    Geran,
    Unknown,
}

impl Default for AccessNetworkType {
    fn default() -> Self {
        AccessNetworkType::Iwlan
    }
}

/// Why a tunnel is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivateReason {
    Normal,
    Shutdown,
    Handover,
}

/// 5G network slice descriptor (S-NSSAI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceInfo {
    pub sst: u8,
    pub sd: Option<[u8; 3]>,
}

/// Interface-level properties of an established tunnel.
///
/// Produced only via [`LinkPropertiesBuilder`]; once built it is immutable
/// and freely shareable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkProperties {
    pub interface_name: String,
    pub internal_addresses: Vec<IpAddr>,
    pub dns_addresses: Vec<IpAddr>,
    pub pcscf_addresses: Vec<IpAddr>,
    pub slice_info: Option<SliceInfo>,
}

#[derive(Debug, Default)]
pub struct LinkPropertiesBuilder {
    interface_name: Option<String>,
    internal_addresses: Vec<IpAddr>,
    dns_addresses: Vec<IpAddr>,
    pcscf_addresses: Vec<IpAddr>,
    slice_info: Option<SliceInfo>,
}

impl LinkPropertiesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interface_name(mut self, name: impl Into<String>) -> Self {
        self.interface_name = Some(name.into());
        self
    }

    pub fn internal_address(mut self, addr: IpAddr) -> Self {
        self.internal_addresses.push(addr);
        self
    }

    pub fn dns_address(mut self, addr: IpAddr) -> Self {
        self.dns_addresses.push(addr);
        self
    }

    pub fn pcscf_address(mut self, addr: IpAddr) -> Self {
        self.pcscf_addresses.push(addr);
        self
    }

    pub fn slice_info(mut self, slice_info: SliceInfo) -> Self {
        self.slice_info = Some(slice_info);
        self
    }

    /// Fails if no interface name was set; every other field is optional.
    pub fn build(self) -> Result<LinkProperties, LinkPropertiesBuildError> {
        Ok(LinkProperties {
            interface_name: self
                .interface_name
                .ok_or(LinkPropertiesBuildError::MissingInterfaceName)?,
            internal_addresses: self.internal_addresses,
            dns_addresses: self.dns_addresses,
            pcscf_addresses: self.pcscf_addresses,
            slice_info: self.slice_info,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkPropertiesBuildError {
    #[error("interface name is required")]
    MissingInterfaceName,
}

/// The closed symbolic set of generic (non-IKE-protocol) failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenericError {
    ServerSelectionFailed,
    TunnelTransformFailed,
    IkeInternalIoException,
    IkeNetworkLostException,
    AuthenticationFailed,
    PdnConnectionRejection,
    IkeConfigLookupFailure,
}

/// The full error taxonomy raised by the IKE driver or the core itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IwlanError {
    /// Sentinel success; clears policy state for the reporting APN.
    NoError,
    /// IKEv2 notify-message type raised by the driver (1..65535).
    IkeProtocolError(u16),
    GenericError(GenericError),
}

impl IwlanError {
    /// Canonicalizes this error to a policy lookup key, or `None` for the
    /// `NoError` sentinel (which never has a policy entry).
    pub fn to_error_type_key(self) -> Option<ErrorTypeKey> {
        match self {
            IwlanError::NoError => None,
            IwlanError::IkeProtocolError(code) => {
                Some(ErrorTypeKey::IkeProtocolError(IkeErrorSelector::Code(code)))
            }
            IwlanError::GenericError(name) => {
                Some(ErrorTypeKey::GenericError(GenericErrorSelector::Known(
                    name,
                )))
            }
        }
    }
}

/// A matched IKE error code, or the wildcard used in policy tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IkeErrorSelector {
    Code(u16),
    Wildcard,
}

/// A matched generic error name, or the wildcard used in policy tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericErrorSelector {
    Known(GenericError),
    Wildcard,
}

/// Key used to look up a policy entry in the Error Policy Engine's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorTypeKey {
    IkeProtocolError(IkeErrorSelector),
    GenericError(GenericErrorSelector),
}

/// ePDG address source priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointSource {
    Static,
    Plmn,
    Pco,
    CellularLoc,
}

/// `(IP address, IP family, source)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpdgEndpoint {
    pub address: IpAddr,
    pub source: EndpointSource,
}

impl EpdgEndpoint {
    pub fn new(address: IpAddr, source: EndpointSource) -> Self {
        Self { address, source }
    }
}

/// Handset-side behaviour to apply when a handover bring-up fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoverFailureMode {
    DoFallback,
    NoFallback,
}

/// Minimum IPv6 MTU; used for every established tunnel absent path-MTU
/// discovery.
pub const TUNNEL_MTU: u32 = 1280;

/// The response shape returned to the platform for both a successful
/// bring-up and a failed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCallResponse {
    pub id: i32,
    pub protocol_type: ProtocolFamily,
    pub cause: FailCause,
    /// Milliseconds to wait before the platform may retry, or `-1` if not
    /// applicable (success, or "give up" per the Error Policy Engine).
    pub retry_duration_ms: i64,
    pub interface_name: Option<String>,
    pub internal_addresses: Vec<IpAddr>,
    pub dns_addresses: Vec<IpAddr>,
    pub pcscf_addresses: Vec<IpAddr>,
    pub gateway_addresses: Vec<IpAddr>,
    pub mtu: u32,
    pub handover_failure_mode: Option<HandoverFailureMode>,
    pub slice_info: Option<SliceInfo>,
}

impl DataCallResponse {
    /// Builds the success response for an APN that just transitioned to `UP`.
    pub fn up(apn: &ApnId, protocol_type: ProtocolFamily, link_properties: &LinkProperties) -> Self {
        let mut gateway_addresses = Vec::new();
        if link_properties
            .internal_addresses
            .iter()
            .any(IpAddr::is_ipv4)
        {
            gateway_addresses.push(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
        }
        if link_properties
            .internal_addresses
            .iter()
            .any(IpAddr::is_ipv6)
        {
            gateway_addresses.push(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED));
        }

        Self {
            id: apn.call_id(),
            protocol_type,
            cause: FailCause::NONE,
            retry_duration_ms: -1,
            interface_name: Some(link_properties.interface_name.clone()),
            internal_addresses: link_properties.internal_addresses.clone(),
            dns_addresses: link_properties.dns_addresses.clone(),
            pcscf_addresses: link_properties.pcscf_addresses.clone(),
            gateway_addresses,
            mtu: TUNNEL_MTU,
            handover_failure_mode: None,
            slice_info: link_properties.slice_info,
        }
    }

    /// Builds the failure response for an APN whose bring-up was rejected by
    /// the driver or the Error Policy Engine.
    pub fn failed(
        apn: &ApnId,
        protocol_type: ProtocolFamily,
        cause: FailCause,
        retry_duration_ms: i64,
        is_handover: bool,
    ) -> Self {
        Self {
            id: apn.call_id(),
            protocol_type,
            cause,
            retry_duration_ms,
            interface_name: None,
            internal_addresses: Vec::new(),
            dns_addresses: Vec::new(),
            pcscf_addresses: Vec::new(),
            gateway_addresses: Vec::new(),
            mtu: TUNNEL_MTU,
            handover_failure_mode: is_handover.then_some(HandoverFailureMode::NoFallback),
            slice_info: None,
        }
    }
}
