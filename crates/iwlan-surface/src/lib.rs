//! Data-call and network-registration surfaces, plus the connectivity/
//! transport monitor that fronts the Tunnel Manager and Error Policy
//! Engine for one carrier slot.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod prefetch;
mod registration;
mod surface;
mod transport;

pub use prefetch::EpdgPrefetcher;
pub use registration::{Domain, NetworkRegistrationInfo, RegistrationState, UnsupportedDomain};
pub use surface::{DataNetworkSurface, SlotConfig};
pub use transport::Transport;

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use iwlan_error_policy::ErrorPolicyEngine;
    use iwlan_event_bus::EventBus;
    use iwlan_tunnel::{DriverEvent, IkeDriver, TunnelManager, TunnelSetupRequestBuilder};
    use iwlan_types::{ApnId, BringUpReason, Event, IwlanError, ProtocolFamily};
    use tokio::sync::mpsc;

    use super::*;

    struct AcceptingDriver {
        events: mpsc::UnboundedSender<DriverEvent>,
    }

    #[async_trait]
    impl IkeDriver for AcceptingDriver {
        async fn bring_up_tunnel(&self, request: iwlan_tunnel::TunnelSetupRequest) -> bool {
            let _ = self.events.send(DriverEvent::Opened {
                apn: request.apn,
                link_properties: iwlan_types::LinkPropertiesBuilder::new().build(),
            });
            true
        }

        async fn close_tunnel(&self, apn: ApnId, _force: bool) {
            let _ = self.events.send(DriverEvent::Closed {
                apn,
                error: IwlanError::NoError,
            });
        }
    }

    struct CountingPrefetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EpdgPrefetcher for CountingPrefetcher {
        async fn prefetch(&self, _is_roaming: bool) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn spawn_surface(
        slot: SlotConfig,
    ) -> (DataNetworkSurface, TunnelManager, EventBus, Arc<CountingPrefetcher>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let driver = Arc::new(AcceptingDriver { events: events_tx });
        let error_policy = ErrorPolicyEngine::spawn();
        let (tunnel_manager, _call_list_rx) =
            TunnelManager::spawn(driver, events_rx, error_policy.clone());
        let event_bus = EventBus::spawn();
        let prefetcher = Arc::new(CountingPrefetcher { calls: AtomicUsize::new(0) });

        let (surface, _registration_rx) = DataNetworkSurface::spawn(
            slot,
            tunnel_manager.clone(),
            error_policy,
            event_bus.clone(),
            prefetcher.clone(),
        );

        (surface, tunnel_manager, event_bus, prefetcher)
    }

    fn ims_request() -> iwlan_tunnel::TunnelSetupRequest {
        TunnelSetupRequestBuilder::new()
            .apn(ApnId::from("ims"))
            .protocol_type(ProtocolFamily::Ipv4v6)
            .reason(BringUpReason::Normal)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn setup_data_call_rejected_when_transport_not_permitted() {
        let (surface, _manager, _bus, _prefetcher) = spawn_surface(SlotConfig {
            is_default_data_slot: true,
            cross_sim_calling_enabled: false,
        });

        let result = surface.setup_data_call(ims_request()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn setup_data_call_succeeds_once_transport_permitted() {
        let (surface, _manager, _bus, _prefetcher) = spawn_surface(SlotConfig {
            is_default_data_slot: true,
            cross_sim_calling_enabled: false,
        });

        surface.set_transport(Transport::Wifi);
        tokio::task::yield_now().await;

        let result = surface.setup_data_call(ims_request()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn transport_switch_force_closes_existing_tunnels() {
        let (surface, manager, _bus, _prefetcher) = spawn_surface(SlotConfig {
            is_default_data_slot: true,
            cross_sim_calling_enabled: true,
        });

        surface.set_transport(Transport::Wifi);
        tokio::task::yield_now().await;
        surface.setup_data_call(ims_request()).await.unwrap();

        surface.set_transport(Transport::Cellular);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let calls = manager.request_data_call_list().await;
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn network_registration_info_rejects_non_ps_domain() {
        let (surface, _manager, _bus, _prefetcher) = spawn_surface(SlotConfig {
            is_default_data_slot: true,
            cross_sim_calling_enabled: false,
        });

        assert!(surface
            .request_network_registration_info(Domain::Other)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn network_registration_info_tracks_wifi_and_subscription_state() {
        let (surface, _manager, _bus, _prefetcher) = spawn_surface(SlotConfig {
            is_default_data_slot: true,
            cross_sim_calling_enabled: false,
        });

        let info = surface
            .request_network_registration_info(Domain::Ps)
            .await
            .unwrap();
        assert_eq!(info.registration_state, RegistrationState::NotRegisteredSearching);
        assert!(info.emergency_only);

        surface.set_wifi_connected(true);
        surface.set_subscription_active(true);
        tokio::task::yield_now().await;

        let info = surface
            .request_network_registration_info(Domain::Ps)
            .await
            .unwrap();
        assert_eq!(info.registration_state, RegistrationState::Home);
        assert!(!info.emergency_only);
    }

    #[tokio::test]
    async fn carrier_config_and_wifi_calling_trigger_prefetch() {
        let (surface, _manager, bus, prefetcher) = spawn_surface(SlotConfig {
            is_default_data_slot: true,
            cross_sim_calling_enabled: false,
        });

        surface.set_wifi_connected(true);
        bus.publish(Event::WifiCallingEnable);
        bus.publish(Event::CarrierConfigChanged);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(prefetcher.calls.load(Ordering::SeqCst), 2);
    }
}
