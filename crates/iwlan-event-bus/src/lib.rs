//! Per-slot fan-out of external events to registered consumers.
//!
//! A single serial worker owns all subscriber state; every mutating
//! operation (subscribe/unsubscribe/publish) is a message enqueued onto
//! that worker, never executed inline on the caller's thread, so consumer
//! code never runs on the publisher's thread.

#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use iwlan_types::Event;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Identifies a single `subscribe` call so it can later be `unsubscribe`d.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

impl SubscriberId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The last-seen Wi-Fi SSID, written only by [`EventBus::on_wifi_connected`]
/// and read by nobody else; this is the one process-wide piece of shared
/// state the Event Bus owns.
static LAST_SEEN_SSID: Mutex<Option<String>> = Mutex::new(None);

enum Command {
    Subscribe {
        id: SubscriberId,
        events: HashSet<Event>,
        sender: mpsc::Sender<Event>,
    },
    Unsubscribe {
        id: SubscriberId,
    },
    Publish(Event),
}

/// Per-slot singleton. Cloning shares the same worker; dropping the last
/// clone lets the worker task end once its command queue closes, which is
/// this type's equivalent of releasing a slot's bus instance.
#[derive(Clone)]
pub struct EventBus {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl EventBus {
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(Worker::new(cmd_rx).run());

        Self { cmd_tx }
    }

    /// Registers a consumer's own queue for the given event kinds. Delivery
    /// happens by sending into `rx`; the caller is responsible for draining
    /// it on its own task, which is what keeps consumer logic off the
    /// publisher's thread.
    pub fn subscribe(&self, events: impl IntoIterator<Item = Event>) -> (SubscriberId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(32);
        let id = SubscriberId::next();

        if self
            .cmd_tx
            .send(Command::Subscribe {
                id,
                events: events.into_iter().collect(),
                sender: tx,
            })
            .is_err()
        {
            tracing::debug!("event bus worker is gone, subscription will never receive events");
        }

        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let _ = self.cmd_tx.send(Command::Unsubscribe { id });
    }

    pub fn publish(&self, event: Event) {
        let _ = self.cmd_tx.send(Command::Publish(event));
    }

    /// Specialized publisher: emits [`Event::WifiApChanged`] iff a
    /// previously-seen, non-empty SSID differs from `ssid`. The first SSID
    /// observed after process start is recorded but never fires the event,
    /// avoiding a spurious unthrottle on the initial camp.
    pub fn on_wifi_connected(&self, ssid: impl Into<String>) {
        let ssid = ssid.into();
        let mut last_seen = LAST_SEEN_SSID.lock();

        let changed = matches!(last_seen.as_deref(), Some(previous) if !previous.is_empty() && previous != ssid);
        *last_seen = Some(ssid);
        drop(last_seen);

        if changed {
            self.publish(Event::WifiApChanged);
        }
    }
}

struct Worker {
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    subscribers: HashMap<SubscriberId, (HashSet<Event>, mpsc::Sender<Event>)>,
}

impl Worker {
    fn new(cmd_rx: mpsc::UnboundedReceiver<Command>) -> Self {
        Self {
            cmd_rx,
            subscribers: HashMap::new(),
        }
    }

    async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                Command::Subscribe { id, events, sender } => {
                    self.subscribers.insert(id, (events, sender));
                }
                Command::Unsubscribe { id } => {
                    self.subscribers.remove(&id);
                }
                Command::Publish(event) => self.dispatch(event),
            }
        }

        tracing::debug!("event bus worker shutting down, slot released");
    }

    fn dispatch(&mut self, event: Event) {
        let mut delivered = false;

        self.subscribers.retain(|_, (interests, sender)| {
            if !interests.contains(&event) {
                return true;
            }

            delivered = true;

            match sender.try_send(event) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(?event, "subscriber queue full, dropping event");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });

        if !delivered {
            tracing::debug!(?event, "published event had no interested subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_only_to_subscribed_event_kinds() {
        let bus = EventBus::spawn();
        let (_id, mut rx) = bus.subscribe([Event::CarrierConfigChanged]);

        bus.publish(Event::ApmEnable);
        bus.publish(Event::CarrierConfigChanged);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, Event::CarrierConfigChanged);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::spawn();
        let (id, mut rx) = bus.subscribe([Event::ApmEnable]);

        bus.unsubscribe(id);
        // Give the worker a chance to process the unsubscribe before publishing.
        tokio::task::yield_now().await;
        bus.publish(Event::ApmEnable);

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());
    }

    // `LAST_SEEN_SSID` is deliberately process-wide, so the two
    // behaviours below share one test to avoid ordering flakiness against
    // other tests in this file.
    #[tokio::test]
    async fn first_ssid_is_recorded_but_later_change_fires_event() {
        *LAST_SEEN_SSID.lock() = None;
        let bus = EventBus::spawn();
        let (_id, mut rx) = bus.subscribe([Event::WifiApChanged]);

        bus.on_wifi_connected("first-network");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err(), "first SSID must not fire the event");

        bus.on_wifi_connected("first-network");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err(), "unchanged SSID must not fire the event");

        bus.on_wifi_connected("second-network");
        let received = rx.recv().await.unwrap();
        assert_eq!(received, Event::WifiApChanged);
    }
}
