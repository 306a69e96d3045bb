//! Request/response value types crossing the manager's boundary: what a
//! caller hands in to bring a tunnel up, and the results handed back.

use std::net::{Ipv4Addr, Ipv6Addr};

use iwlan_types::{AccessNetworkType, ApnId, BringUpReason, ProtocolFamily, SliceInfo};

/// Built from the platform's `setupDataCall` profile plus (on handover)
/// the source addresses and session identity to preserve
/// (`setupDataCall`).
#[derive(Debug, Clone)]
pub struct TunnelSetupRequest {
    pub apn: ApnId,
    pub access_network: AccessNetworkType,
    pub protocol_type: ProtocolFamily,
    pub reason: BringUpReason,
    pub pdu_session_id: u8,
    pub is_emergency: bool,
    pub pcscf_required: bool,
    pub slice_info: Option<SliceInfo>,
    pub handover_source: Option<HandoverSource>,
}

/// Source IPv4/IPv6 addresses carried over from the bearer being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoverSource {
    pub source_ipv4: Option<Ipv4Addr>,
    pub source_ipv6: Option<Ipv6Addr>,
}

#[derive(Debug, Default)]
pub struct TunnelSetupRequestBuilder {
    apn: Option<ApnId>,
    access_network: AccessNetworkType,
    protocol_type: Option<ProtocolFamily>,
    reason: Option<BringUpReason>,
    pdu_session_id: u8,
    is_emergency: bool,
    pcscf_required: bool,
    slice_info: Option<SliceInfo>,
    handover_source: Option<HandoverSource>,
}

impl TunnelSetupRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apn(mut self, apn: ApnId) -> Self {
        self.apn = Some(apn);
        self
    }

    /// Defaults to [`AccessNetworkType::Iwlan`] if never called; any other
    /// value fails `build()` with `INVALID_ARG`.
    pub fn access_network(mut self, access_network: AccessNetworkType) -> Self {
        self.access_network = access_network;
        self
    }

    pub fn protocol_type(mut self, protocol_type: ProtocolFamily) -> Self {
        self.protocol_type = Some(protocol_type);
        self
    }

    pub fn reason(mut self, reason: BringUpReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn pdu_session_id(mut self, id: u8) -> Self {
        self.pdu_session_id = id;
        self
    }

    pub fn emergency(mut self, is_emergency: bool) -> Self {
        self.is_emergency = is_emergency;
        self
    }

    pub fn pcscf_required(mut self, required: bool) -> Self {
        self.pcscf_required = required;
        self
    }

    pub fn slice_info(mut self, slice_info: SliceInfo) -> Self {
        self.slice_info = Some(slice_info);
        self
    }

    pub fn handover_source(mut self, source: HandoverSource) -> Self {
        self.handover_source = Some(source);
        self
    }

    /// Fails with `INVALID_ARG` if the access network isn't
    /// [`AccessNetworkType::Iwlan`], or if `reason == Handover` without a
    /// `handover_source`.
    pub fn build(self) -> Result<TunnelSetupRequest, SetupDataCallError> {
        let apn = self.apn.ok_or(SetupDataCallError::InvalidArg)?;
        let protocol_type = self.protocol_type.ok_or(SetupDataCallError::InvalidArg)?;
        let reason = self.reason.ok_or(SetupDataCallError::InvalidArg)?;

        if self.access_network != AccessNetworkType::Iwlan {
            return Err(SetupDataCallError::InvalidArg);
        }

        if reason == BringUpReason::Handover && self.handover_source.is_none() {
            return Err(SetupDataCallError::InvalidArg);
        }

        Ok(TunnelSetupRequest {
            apn,
            access_network: self.access_network,
            protocol_type,
            reason,
            pdu_session_id: self.pdu_session_id,
            is_emergency: self.is_emergency,
            pcscf_required: self.pcscf_required,
            slice_info: self.slice_info,
            handover_source: self.handover_source,
        })
    }
}

/// Mirrors the platform's `result ∈ {SUCCESS, ERROR_ILLEGAL_STATE,
/// ERROR_INVALID_ARG}`, carried as an error variant for the
/// two rejection cases since a `SUCCESS` carrying a failure
/// `DataCallResponse` is represented as `Ok` in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SetupDataCallError {
    #[error("invalid argument")]
    InvalidArg,
    #[error("illegal state")]
    IllegalState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeactivateDataCallError {
    #[error("no tunnel found for cid")]
    InvalidArg,
}

pub use iwlan_types::DeactivateReason as DeactivateDataCallReason;

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> TunnelSetupRequestBuilder {
        TunnelSetupRequestBuilder::new()
            .apn(ApnId::new("ims"))
            .protocol_type(ProtocolFamily::Ipv4)
            .reason(BringUpReason::Normal)
    }

    #[test]
    fn non_iwlan_access_network_is_rejected() {
        let result = builder().access_network(AccessNetworkType::Eutran).build();
        assert!(matches!(result, Err(SetupDataCallError::InvalidArg)));
    }

    #[test]
    fn defaults_to_iwlan_when_unset() {
        assert!(builder().build().is_ok());
    }

    #[test]
    fn handover_without_source_is_rejected() {
        let result = builder().reason(BringUpReason::Handover).build();
        assert!(matches!(result, Err(SetupDataCallError::InvalidArg)));
    }
}
