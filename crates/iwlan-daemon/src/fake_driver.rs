//! A deterministic in-memory [`IkeDriver`] for manually exercising the
//! daemon without a real IKEv2 stack ("IKE driver contract").
//! Every bring-up succeeds after a short simulated delay; every close
//! reports [`IwlanError::NoError`].

use std::time::Duration;

use async_trait::async_trait;
use iwlan_tunnel::{DriverEvent, IkeDriver, TunnelSetupRequest};
use iwlan_types::{ApnId, IwlanError, LinkPropertiesBuilder};
use tokio::sync::mpsc;

pub struct FakeIkeDriver {
    events: mpsc::UnboundedSender<DriverEvent>,
}

impl FakeIkeDriver {
    pub fn new(events: mpsc::UnboundedSender<DriverEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl IkeDriver for FakeIkeDriver {
    async fn bring_up_tunnel(&self, request: TunnelSetupRequest) -> bool {
        let events = self.events.clone();
        let apn = request.apn.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;

            let link_properties = LinkPropertiesBuilder::new()
                .interface_name(format!("ipsec-{apn}"))
                .build();

            let _ = events.send(DriverEvent::Opened { apn, link_properties });
        });

        true
    }

    async fn close_tunnel(&self, apn: &ApnId, _force: bool) {
        let events = self.events.clone();
        let apn = apn.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = events.send(DriverEvent::Closed { apn, error: IwlanError::NoError });
        });
    }
}
