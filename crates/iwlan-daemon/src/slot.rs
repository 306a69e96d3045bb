//! Wires one SIM slot's singletons together: Event Bus, Error Policy
//! Engine, Tunnel Manager, and Data/Network surface.

use std::sync::Arc;

use iwlan_error_policy::ErrorPolicyEngine;
use iwlan_event_bus::EventBus;
use iwlan_surface::{DataNetworkSurface, EpdgPrefetcher, NetworkRegistrationInfo, SlotConfig};
use iwlan_tunnel::{DriverEvent, IkeDriver, TunnelManager};
use iwlan_types::DataCallResponse;
use tokio::sync::{mpsc, watch};

use crate::fake_driver::FakeIkeDriver;

pub struct Slot {
    pub surface: DataNetworkSurface,
    pub error_policy: ErrorPolicyEngine,
    pub event_bus: EventBus,
    pub call_list: watch::Receiver<Vec<DataCallResponse>>,
    pub registration: watch::Receiver<NetworkRegistrationInfo>,
}

/// Spawns every per-slot worker and returns handles to the ones the
/// daemon's outer layers (CLI commands, carrier-config watcher) need.
///
/// `driver` is `None` to fall back to [`FakeIkeDriver`] for manual
/// exercising; a real deployment supplies its own `IkeDriver`.
pub fn spawn(
    slot_config: SlotConfig,
    prefetcher: Arc<dyn EpdgPrefetcher>,
    driver: Option<Arc<dyn IkeDriver>>,
) -> Slot {
    let error_policy = ErrorPolicyEngine::spawn();
    let event_bus = EventBus::spawn();

    let (driver_events_tx, driver_events_rx) = mpsc::unbounded_channel();
    let driver = driver.unwrap_or_else(|| Arc::new(FakeIkeDriver::new(driver_events_tx)) as Arc<dyn IkeDriver>);

    let (tunnel_manager, call_list) =
        TunnelManager::spawn(driver, driver_events_rx, error_policy.clone());

    let (surface, registration) = DataNetworkSurface::spawn(
        slot_config,
        tunnel_manager,
        error_policy.clone(),
        event_bus.clone(),
        prefetcher,
    );

    Slot {
        surface,
        error_policy,
        event_bus,
        call_list,
        registration,
    }
}

#[cfg(test)]
mod tests {
    use iwlan_tunnel::TunnelSetupRequestBuilder;
    use iwlan_types::{ApnId, BringUpReason, ProtocolFamily};

    use super::*;

    struct NoopPrefetcher;

    #[async_trait::async_trait]
    impl EpdgPrefetcher for NoopPrefetcher {
        async fn prefetch(&self, _is_roaming: bool) {}
    }

    #[tokio::test]
    async fn spawned_slot_brings_up_a_tunnel_via_the_fake_driver() {
        let slot = spawn(
            SlotConfig {
                is_default_data_slot: true,
                cross_sim_calling_enabled: false,
            },
            Arc::new(NoopPrefetcher),
            None,
        );
        slot.surface.set_transport(iwlan_surface::Transport::Wifi);

        let request = TunnelSetupRequestBuilder::new()
            .apn(ApnId::new("ims"))
            .protocol_type(ProtocolFamily::Ipv4v6)
            .reason(BringUpReason::Normal)
            .build()
            .unwrap();

        let response = slot.surface.setup_data_call(request).await.unwrap();
        assert_eq!(response.id, ApnId::new("ims").call_id());
    }
}
