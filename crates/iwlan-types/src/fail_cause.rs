use crate::{GenericError, IwlanError};
use serde::{Deserialize, Serialize};

/// Platform-defined integer fail-cause code surfaced in a failed
/// [`crate::DataCallResponse`] (`getDataFailCause`).
///
/// Values mirror the public Android `DataFailCause` constants this system
/// is modeled on; callers outside this workspace should treat them as
/// opaque integers, not re-derive meaning from the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailCause(pub i32);

impl FailCause {
    pub const NONE: FailCause = FailCause(0);
    pub const ERROR_UNSPECIFIED: FailCause = FailCause(0xFFFF);
    pub const USER_AUTHENTICATION: FailCause = FailCause(9);
    pub const IWLAN_PDN_CONNECTION_REJECTION: FailCause = FailCause(0x8001);
    pub const IWLAN_TUNNEL_TRANSFORM_FAILURE: FailCause = FailCause(0x8006);
    pub const IWLAN_NETWORK_FAILURE: FailCause = FailCause(0x8007);
    pub const IWLAN_SERVER_SELECTION_FAILED: FailCause = FailCause(0x8026);
    pub const IWLAN_CONFIG_LOOKUP_FAILURE: FailCause = FailCause(0x8036);
    pub const IWLAN_IKE_CONFIG_LOOKUP_FAILURE: FailCause = FailCause(0x8037);

    /// The fixed mapping table from a raised error to its platform fail
    /// cause. IKE protocol errors outside the few specially-named notify
    /// codes fall back to `ERROR_UNSPECIFIED`.
    pub fn from_error(error: IwlanError) -> Self {
        match error {
            IwlanError::NoError => FailCause::NONE,
            IwlanError::GenericError(GenericError::ServerSelectionFailed) => {
                FailCause::IWLAN_SERVER_SELECTION_FAILED
            }
            IwlanError::GenericError(GenericError::TunnelTransformFailed) => {
                FailCause::IWLAN_TUNNEL_TRANSFORM_FAILURE
            }
            IwlanError::GenericError(GenericError::IkeInternalIoException)
            | IwlanError::GenericError(GenericError::IkeNetworkLostException) => {
                FailCause::IWLAN_NETWORK_FAILURE
            }
            IwlanError::GenericError(GenericError::AuthenticationFailed) => {
                FailCause::USER_AUTHENTICATION
            }
            IwlanError::GenericError(GenericError::PdnConnectionRejection) => {
                FailCause::IWLAN_PDN_CONNECTION_REJECTION
            }
            IwlanError::GenericError(GenericError::IkeConfigLookupFailure) => {
                FailCause::IWLAN_IKE_CONFIG_LOOKUP_FAILURE
            }
            IwlanError::IkeProtocolError(8192) => FailCause::IWLAN_PDN_CONNECTION_REJECTION,
            IwlanError::IkeProtocolError(_) => FailCause::ERROR_UNSPECIFIED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failed_maps_to_user_authentication() {
        assert_eq!(
            FailCause::from_error(IwlanError::GenericError(GenericError::AuthenticationFailed)),
            FailCause::USER_AUTHENTICATION
        );
    }

    #[test]
    fn unrecognized_ike_protocol_8192_maps_to_pdn_connection_rejection() {
        assert_eq!(
            FailCause::from_error(IwlanError::IkeProtocolError(8192)),
            FailCause::IWLAN_PDN_CONNECTION_REJECTION
        );
    }
}
