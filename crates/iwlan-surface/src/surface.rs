//! The Data/Network surface worker: one serial worker per slot, exactly
//! like the Tunnel Manager and Error Engine it fronts.

use std::sync::Arc;

use iwlan_error_policy::ErrorPolicyEngine;
use iwlan_event_bus::EventBus;
use iwlan_tunnel::{
    DeactivateDataCallError, DeactivateDataCallReason, SetupDataCallError, TunnelManager,
    TunnelSetupRequest,
};
use iwlan_types::{DataCallResponse, Event};
use tokio::sync::{mpsc, oneshot, watch};

use crate::prefetch::EpdgPrefetcher;
use crate::registration::{self, Domain, NetworkRegistrationInfo, UnsupportedDomain};
use crate::transport::{self, Transport};

enum Command {
    SetupDataCall {
        request: TunnelSetupRequest,
        reply: oneshot::Sender<Result<DataCallResponse, SetupDataCallError>>,
    },
    DeactivateDataCall {
        cid: i32,
        reason: DeactivateDataCallReason,
        reply: oneshot::Sender<Result<(), DeactivateDataCallError>>,
    },
    RequestDataCallList {
        reply: oneshot::Sender<Vec<DataCallResponse>>,
    },
    RequestNetworkRegistrationInfo {
        domain: Domain,
        reply: oneshot::Sender<Result<NetworkRegistrationInfo, UnsupportedDomain>>,
    },
    SetWifiConnected(bool),
    SetSubscriptionActive(bool),
    SetTransport(Transport),
}

/// Per-slot config that doesn't change after construction.
pub struct SlotConfig {
    pub is_default_data_slot: bool,
    pub cross_sim_calling_enabled: bool,
}

/// Per-slot singleton handle. Cloning shares the same worker.
#[derive(Clone)]
pub struct DataNetworkSurface {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl DataNetworkSurface {
    pub fn spawn(
        slot: SlotConfig,
        tunnel_manager: TunnelManager,
        error_policy: ErrorPolicyEngine,
        event_bus: EventBus,
        prefetcher: Arc<dyn EpdgPrefetcher>,
    ) -> (Self, watch::Receiver<NetworkRegistrationInfo>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (registration_tx, registration_rx) = watch::channel(registration::build(false, false));

        let (_sub_id, events_rx) = event_bus.subscribe([
            Event::CarrierConfigChanged,
            Event::WifiCallingEnable,
            Event::WifiCallingDisable,
        ]);

        tokio::spawn(
            Worker {
                cmd_rx,
                events_rx,
                tunnel_manager,
                error_policy,
                prefetcher,
                slot,
                wifi_connected: false,
                subscription_active: false,
                transport: Transport::Unspec,
                carrier_config_ready: false,
                wifi_calling_enabled: false,
                registration_tx,
            }
            .run(),
        );

        (Self { cmd_tx }, registration_rx)
    }

    pub async fn setup_data_call(
        &self,
        request: TunnelSetupRequest,
    ) -> Result<DataCallResponse, SetupDataCallError> {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::SetupDataCall { request, reply }).is_err() {
            return Err(SetupDataCallError::IllegalState);
        }
        rx.await.unwrap_or(Err(SetupDataCallError::IllegalState))
    }

    pub async fn deactivate_data_call(
        &self,
        cid: i32,
        reason: DeactivateDataCallReason,
    ) -> Result<(), DeactivateDataCallError> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::DeactivateDataCall { cid, reason, reply })
            .is_err()
        {
            return Err(DeactivateDataCallError::InvalidArg);
        }
        rx.await.unwrap_or(Err(DeactivateDataCallError::InvalidArg))
    }

    pub async fn request_data_call_list(&self) -> Vec<DataCallResponse> {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::RequestDataCallList { reply }).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn request_network_registration_info(
        &self,
        domain: Domain,
    ) -> Result<NetworkRegistrationInfo, UnsupportedDomain> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::RequestNetworkRegistrationInfo { domain, reply })
            .is_err()
        {
            return Err(UnsupportedDomain);
        }
        rx.await.unwrap_or(Err(UnsupportedDomain))
    }

    pub fn set_wifi_connected(&self, connected: bool) {
        let _ = self.cmd_tx.send(Command::SetWifiConnected(connected));
    }

    pub fn set_subscription_active(&self, active: bool) {
        let _ = self.cmd_tx.send(Command::SetSubscriptionActive(active));
    }

    pub fn set_transport(&self, transport: Transport) {
        let _ = self.cmd_tx.send(Command::SetTransport(transport));
    }
}

struct Worker {
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    events_rx: mpsc::Receiver<Event>,
    tunnel_manager: TunnelManager,
    error_policy: ErrorPolicyEngine,
    prefetcher: Arc<dyn EpdgPrefetcher>,
    slot: SlotConfig,
    wifi_connected: bool,
    subscription_active: bool,
    transport: Transport,
    carrier_config_ready: bool,
    wifi_calling_enabled: bool,
    registration_tx: watch::Sender<NetworkRegistrationInfo>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => break,
                    }
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {}
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SetupDataCall { request, reply } => {
                let result = self.setup_data_call(request).await;
                let _ = reply.send(result);
            }
            Command::DeactivateDataCall { cid, reason, reply } => {
                let result = self.tunnel_manager.deactivate_data_call(cid, reason).await;
                let _ = reply.send(result);
            }
            Command::RequestDataCallList { reply } => {
                let _ = reply.send(self.tunnel_manager.request_data_call_list().await);
            }
            Command::RequestNetworkRegistrationInfo { domain, reply } => {
                let result = match domain {
                    Domain::Ps => Ok(registration::build(self.wifi_connected, self.subscription_active)),
                    Domain::Other => Err(UnsupportedDomain),
                };
                let _ = reply.send(result);
            }
            Command::SetWifiConnected(connected) => {
                if self.wifi_connected != connected {
                    self.wifi_connected = connected;
                    self.publish_registration();
                }
                self.maybe_prefetch().await;
            }
            Command::SetSubscriptionActive(active) => {
                if self.subscription_active != active {
                    self.subscription_active = active;
                    self.publish_registration();
                }
            }
            Command::SetTransport(transport) => self.set_transport(transport).await,
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::CarrierConfigChanged => {
                self.carrier_config_ready = true;
                self.maybe_prefetch().await;
            }
            Event::WifiCallingEnable => {
                self.wifi_calling_enabled = true;
                self.maybe_prefetch().await;
            }
            Event::WifiCallingDisable => self.wifi_calling_enabled = false,
            _ => {}
        }
    }

    async fn setup_data_call(
        &mut self,
        request: TunnelSetupRequest,
    ) -> Result<DataCallResponse, SetupDataCallError> {
        let permitted = transport::is_bring_up_permitted(
            self.transport,
            self.slot.is_default_data_slot,
            self.slot.cross_sim_calling_enabled,
        );
        if !permitted {
            return Err(SetupDataCallError::IllegalState);
        }

        if !self.error_policy.can_bring_up_tunnel(request.apn.clone()).await {
            return Err(SetupDataCallError::IllegalState);
        }

        self.tunnel_manager.setup_data_call(request).await
    }

    async fn set_transport(&mut self, transport: Transport) {
        let previous = self.transport;
        if transport != Transport::Unspec && previous != Transport::Unspec && transport != previous {
            self.tunnel_manager.force_close_all();
        }

        self.transport = transport;
        self.tunnel_manager.set_transport_permitted(transport::is_bring_up_permitted(
            transport,
            self.slot.is_default_data_slot,
            self.slot.cross_sim_calling_enabled,
        ));
    }

    fn publish_registration(&self) {
        self.registration_tx
            .send_replace(registration::build(self.wifi_connected, self.subscription_active));
    }

    /// Kicks the selector twice (non-roaming, then roaming) to warm DNS
    /// caches once every precondition holds. Fire-and-
    /// forget: failures and results are both discarded.
    async fn maybe_prefetch(&self) {
        if !self.carrier_config_ready || !self.wifi_calling_enabled || !self.wifi_connected {
            return;
        }
        if !self.tunnel_manager.request_data_call_list().await.is_empty() {
            return;
        }

        let prefetcher = self.prefetcher.clone();
        tokio::spawn(async move {
            prefetcher.prefetch(false).await;
            prefetcher.prefetch(true).await;
        });
    }
}
