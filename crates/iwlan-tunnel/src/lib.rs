//! Per-slot Tunnel Lifecycle Manager: the per-APN state
//! machine that orchestrates the ePDG selector, the external IKE driver,
//! and the Error Policy Engine, and serializes every driver callback onto
//! its own worker.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod driver;
mod manager;
mod request;

pub use driver::{DriverEvent, IkeDriver};
pub use manager::TunnelManager;
pub use request::{
    DeactivateDataCallError, DeactivateDataCallReason, HandoverSource, SetupDataCallError,
    TunnelSetupRequest, TunnelSetupRequestBuilder,
};
