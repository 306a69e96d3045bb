//! Per-slot Tunnel Lifecycle Manager: the per-APN `DOWN/BRINGING_UP/UP/
//! BRINGING_DOWN` state machine, confined to a single
//! serial worker so that all tunnel-state mutation happens only on the task
//! polling its own command channel.

use std::collections::HashMap;
use std::sync::Arc;

use iwlan_error_policy::ErrorPolicyEngine;
use iwlan_types::{ApnId, DataCallResponse, DeactivateReason, IwlanError, LinkProperties};
use tokio::sync::{mpsc, oneshot, watch};

use crate::driver::{DriverEvent, IkeDriver};
use crate::request::{
    DeactivateDataCallError, DeactivateDataCallReason, SetupDataCallError, TunnelSetupRequest,
};

struct TunnelRecord {
    state: TunnelPhase,
    protocol_type: iwlan_types::ProtocolFamily,
    is_handover: bool,
    link_properties: Option<LinkProperties>,
    completion: Option<oneshot::Sender<Result<DataCallResponse, SetupDataCallError>>>,
    deactivate_completion: Option<oneshot::Sender<Result<(), DeactivateDataCallError>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TunnelPhase {
    BringingUp,
    Up,
    BringingDown,
}

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
    SetTransportPermitted(bool),
    ForceCloseAll,
}

/// Per-slot singleton handle. Cloning shares the same worker.
#[derive(Clone)]
pub struct TunnelManager {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl TunnelManager {
    /// `driver_events` is the receiving half of whatever channel `driver`
    /// was constructed with for posting `onOpened`/`onClosed` callbacks;
    /// wiring the two together is the caller's responsibility, taking
    /// pre-built channel halves rather than constructing them internally.
    pub fn spawn(
        driver: Arc<dyn IkeDriver>,
        driver_events: mpsc::UnboundedReceiver<DriverEvent>,
        error_policy: ErrorPolicyEngine,
    ) -> (Self, watch::Receiver<Vec<DataCallResponse>>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (call_list_tx, call_list_rx) = watch::channel(Vec::new());

        tokio::spawn(
            Worker {
                cmd_rx,
                driver_events,
                driver,
                error_policy,
                records: HashMap::new(),
                call_list_tx,
                transport_permitted: false,
            }
            .run(),
        );

        (Self { cmd_tx }, call_list_rx)
    }

    pub async fn setup_data_call(
        &self,
        request: TunnelSetupRequest,
    ) -> Result<DataCallResponse, SetupDataCallError> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::SetupDataCall { request, reply })
            .is_err()
        {
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

    /// Updates the gating verdict consulted by `setupDataCall`; the latest
    /// value is checked inside this manager's own worker, never raced
    /// against from outside it.
    pub fn set_transport_permitted(&self, permitted: bool) {
        let _ = self.cmd_tx.send(Command::SetTransportPermitted(permitted));
    }

    /// Tears down every tunnel without waiting for a graceful close
    /// (triggered on a default-transport switch).
    pub fn force_close_all(&self) {
        let _ = self.cmd_tx.send(Command::ForceCloseAll);
    }
}

struct Worker {
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    driver_events: mpsc::UnboundedReceiver<DriverEvent>,
    driver: Arc<dyn IkeDriver>,
    error_policy: ErrorPolicyEngine,
    records: HashMap<ApnId, TunnelRecord>,
    call_list_tx: watch::Sender<Vec<DataCallResponse>>,
    transport_permitted: bool,
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
                event = self.driver_events.recv() => {
                    match event {
                        Some(event) => self.handle_driver_event(event).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SetupDataCall { request, reply } => {
                self.setup_data_call(request, reply).await;
            }
            Command::DeactivateDataCall { cid, reason, reply } => {
                self.deactivate_data_call(cid, reason, reply).await;
            }
            Command::RequestDataCallList { reply } => {
                let _ = reply.send(self.call_list());
            }
            Command::SetTransportPermitted(permitted) => {
                self.transport_permitted = permitted;
            }
            Command::ForceCloseAll => self.force_close_all().await,
        }
    }

    /// Dispatches the request and returns; the reply is resolved later,
    /// from `on_opened`/`on_closed`, once the driver's callback for this
    /// APN arrives on `driver_events`. Never blocks this worker waiting
    /// for tunnel establishment ("request dispatch is
    /// non-blocking; completion arrives as a callback").
    async fn setup_data_call(
        &mut self,
        request: TunnelSetupRequest,
        reply: oneshot::Sender<Result<DataCallResponse, SetupDataCallError>>,
    ) {
        if !self.transport_permitted || self.records.contains_key(&request.apn) {
            let _ = reply.send(Err(SetupDataCallError::IllegalState));
            return;
        }

        let apn = request.apn.clone();
        let protocol_type = request.protocol_type;
        let is_handover = matches!(request.reason, iwlan_types::BringUpReason::Handover);

        self.records.insert(
            apn.clone(),
            TunnelRecord {
                state: TunnelPhase::BringingUp,
                protocol_type,
                is_handover,
                link_properties: None,
                completion: Some(reply),
                deactivate_completion: None,
            },
        );

        if !self.driver.bring_up_tunnel(request).await {
            if let Some(record) = self.records.remove(&apn) {
                if let Some(completion) = record.completion {
                    let _ = completion.send(Err(SetupDataCallError::InvalidArg));
                }
            }
        }
    }

    /// Same non-blocking shape as `setup_data_call`: dispatches the close
    /// and returns, resolving `reply` later from `on_closed`.
    async fn deactivate_data_call(
        &mut self,
        cid: i32,
        reason: DeactivateDataCallReason,
        reply: oneshot::Sender<Result<(), DeactivateDataCallError>>,
    ) {
        let Some(apn) = self.records.keys().find(|apn| apn.call_id() == cid).cloned() else {
            let _ = reply.send(Err(DeactivateDataCallError::InvalidArg));
            return;
        };

        let force = matches!(reason, DeactivateReason::Shutdown);

        let record = self.records.get_mut(&apn).expect("just found by key");
        record.state = TunnelPhase::BringingDown;
        record.deactivate_completion = Some(reply);

        self.driver.close_tunnel(&apn, force).await;
    }

    async fn force_close_all(&mut self) {
        let apns: Vec<ApnId> = self.records.keys().cloned().collect();
        for apn in apns {
            self.driver.close_tunnel(&apn, true).await;
        }
        self.records.clear();
        self.publish_call_list();
    }

    async fn handle_driver_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Opened { apn, link_properties } => self.on_opened(apn, link_properties).await,
            DriverEvent::Closed { apn, error } => self.on_closed(apn, error).await,
        }
    }

    async fn on_opened(&mut self, apn: ApnId, link_properties: LinkProperties) {
        let Some(record) = self.records.get_mut(&apn) else {
            return;
        };

        match record.state {
            TunnelPhase::BringingUp => {
                record.state = TunnelPhase::Up;

                let response = DataCallResponse::up(&apn, record.protocol_type, &link_properties);
                record.link_properties = Some(link_properties);

                if let Some(completion) = record.completion.take() {
                    let _ = completion.send(Ok(response));
                }

                self.publish_call_list();
            }
            TunnelPhase::BringingDown => {
                // deactivateDataCall raced in while the bring-up was still
                // in flight: the driver opened a tunnel nobody wants
                // anymore. The original setup never completes
                // successfully; close the tunnel again and let the
                // pending deactivate completion resolve off the `Closed`
                // this produces.
                record.link_properties = Some(link_properties);

                if let Some(completion) = record.completion.take() {
                    let _ = completion.send(Err(SetupDataCallError::IllegalState));
                }

                self.driver.close_tunnel(&apn, false).await;
            }
            TunnelPhase::Up => {
                debug_assert!(false, "driver reported Opened for an already-up tunnel {apn}");
            }
        }
    }

    async fn on_closed(&mut self, apn: ApnId, error: IwlanError) {
        let Some(record) = self.records.remove(&apn) else {
            return;
        };

        match record.state {
            TunnelPhase::BringingUp => {
                let protocol_type = record.protocol_type;
                let is_handover = record.is_handover;

                self.error_policy.report_error(apn.clone(), error).await;
                let cause = self.error_policy.get_data_fail_cause(apn.clone()).await;
                let retry_duration_ms = self.error_policy.get_current_retry_time_ms(apn.clone()).await;

                let response = DataCallResponse::failed(
                    &apn,
                    protocol_type,
                    cause,
                    retry_duration_ms,
                    is_handover,
                );

                if let Some(completion) = record.completion {
                    let _ = completion.send(Ok(response));
                }

                self.publish_call_list();
            }
            TunnelPhase::BringingDown => {
                // Only these two are tolerated here; anything else is a
                // contract violation by the driver.
                assert!(
                    matches!(error, IwlanError::NoError)
                        || matches!(
                            error,
                            IwlanError::GenericError(iwlan_types::GenericError::IkeInternalIoException)
                        ),
                    "driver reported an untolerated error while tearing down {apn}: {error:?}"
                );

                if let Some(completion) = record.deactivate_completion {
                    let _ = completion.send(Ok(()));
                }

                self.publish_call_list();
            }
            TunnelPhase::Up => {
                // Unsolicited close of an established tunnel.
                self.publish_call_list();
            }
        }
    }

    fn call_list(&self) -> Vec<DataCallResponse> {
        self.records
            .iter()
            .filter(|(_, record)| record.state == TunnelPhase::Up)
            .filter_map(|(apn, record)| {
                let link_properties = record.link_properties.as_ref()?;
                Some(DataCallResponse::up(apn, record.protocol_type, link_properties))
            })
            .collect()
    }

    fn publish_call_list(&self) {
        self.call_list_tx.send_replace(self.call_list());
    }
}
