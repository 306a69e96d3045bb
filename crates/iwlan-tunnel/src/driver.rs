//! The external IKE driver contract the manager drives.
//!
//! An external IKEv2/IPsec library is assumed; this crate never touches
//! IKE packets itself, only the request/callback shape of driving one.

use iwlan_types::{ApnId, IwlanError, LinkProperties};

use crate::request::TunnelSetupRequest;

/// Owned by the [`crate::TunnelManager`] worker and invoked from it.
/// `bring_up_tunnel` dispatch is non-blocking: acceptance/rejection is
/// synchronous, but completion always arrives later as a [`DriverEvent`].
#[async_trait::async_trait]
pub trait IkeDriver: Send + Sync {
    /// Returns `false` if the driver synchronously rejects the request
    /// (malformed parameters, resource exhaustion); `true` means the
    /// driver accepted the request and will eventually report `Opened` or
    /// `Closed` for this APN.
    async fn bring_up_tunnel(&self, request: TunnelSetupRequest) -> bool;

    /// Starts tearing down the tunnel for `apn`. `force` means tear down
    /// without waiting for a graceful close ("forceClose").
    async fn close_tunnel(&self, apn: &ApnId, force: bool);
}

/// Delivered by the driver, off its own execution context, onto the
/// manager's worker queue.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    Opened {
        apn: ApnId,
        link_properties: LinkProperties,
    },
    Closed {
        apn: ApnId,
        error: IwlanError,
    },
}
