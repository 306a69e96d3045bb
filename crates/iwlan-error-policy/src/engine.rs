//! The serialized worker that owns every `(APN, ErrorTypeKey)` record and
//! the currently-active [`PolicyTable`]. Every operation is
//! a message sent to this worker, giving callers linearizable semantics
//! without an explicit mutex.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use iwlan_types::{ApnId, Event, ErrorTypeKey, FailCause, IwlanError};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::policy::PolicyTable;

struct Record {
    current_index: Option<usize>,
    throttle_until: Instant,
    last_wait_seconds: i64,
    unthrottle_events: HashSet<Event>,
}

struct ApnState {
    records: HashMap<ErrorTypeKey, Record>,
    last_error: Option<IwlanError>,
    /// Wait time returned by the most recent `reportError` for this APN,
    /// across all `ErrorTypeKey`s. What `getCurrentRetryTime` reports,
    /// independent of which key's record it updated.
    last_wait_seconds: i64,
}

impl Default for ApnState {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            last_error: None,
            last_wait_seconds: -1,
        }
    }
}

enum Command {
    SetPolicy(PolicyTable),
    ReportError {
        apn: ApnId,
        error: IwlanError,
        reply: oneshot::Sender<i64>,
    },
    CanBringUpTunnel {
        apn: ApnId,
        reply: oneshot::Sender<bool>,
    },
    GetCurrentRetryTime {
        apn: ApnId,
        reply: oneshot::Sender<i64>,
    },
    GetDataFailCause {
        apn: ApnId,
        reply: oneshot::Sender<FailCause>,
    },
    HandleEvent(Event),
}

/// Per-slot singleton handle. Cloning shares the same worker.
#[derive(Clone)]
pub struct ErrorPolicyEngine {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl ErrorPolicyEngine {
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(Worker::new(cmd_rx).run());

        Self { cmd_tx }
    }

    /// Atomically supersedes the previous configuration. In-flight throttle
    /// records are preserved, keyed by `(APN, ErrorTypeKey)`.
    pub fn set_policy(&self, table: PolicyTable) {
        let _ = self.cmd_tx.send(Command::SetPolicy(table));
    }

    pub async fn report_error(&self, apn: ApnId, error: IwlanError) -> i64 {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::ReportError { apn, error, reply })
            .is_err()
        {
            return -1;
        }
        rx.await.unwrap_or(-1)
    }

    pub async fn can_bring_up_tunnel(&self, apn: ApnId) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::CanBringUpTunnel { apn, reply })
            .is_err()
        {
            return true;
        }
        rx.await.unwrap_or(true)
    }

    pub async fn get_current_retry_time_ms(&self, apn: ApnId) -> i64 {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::GetCurrentRetryTime { apn, reply })
            .is_err()
        {
            return -1;
        }
        rx.await.unwrap_or(-1)
    }

    pub async fn get_data_fail_cause(&self, apn: ApnId) -> FailCause {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::GetDataFailCause { apn, reply })
            .is_err()
        {
            return FailCause::NONE;
        }
        rx.await.unwrap_or(FailCause::NONE)
    }

    /// Resets every record whose policy entry lists `event` among its
    /// `unthrottle_events`.
    pub fn handle_event(&self, event: Event) {
        let _ = self.cmd_tx.send(Command::HandleEvent(event));
    }
}

struct Worker {
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    policy: PolicyTable,
    apns: HashMap<ApnId, ApnState>,
}

impl Worker {
    fn new(cmd_rx: mpsc::UnboundedReceiver<Command>) -> Self {
        Self {
            cmd_rx,
            policy: PolicyTable::default(),
            apns: HashMap::new(),
        }
    }

    async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                Command::SetPolicy(table) => self.policy = table,
                Command::ReportError { apn, error, reply } => {
                    let wait = self.report_error(apn, error);
                    let _ = reply.send(wait);
                }
                Command::CanBringUpTunnel { apn, reply } => {
                    let _ = reply.send(self.can_bring_up_tunnel(&apn));
                }
                Command::GetCurrentRetryTime { apn, reply } => {
                    let ms = self.current_retry_time_ms(&apn);
                    let _ = reply.send(ms);
                }
                Command::GetDataFailCause { apn, reply } => {
                    let cause = self.data_fail_cause(&apn);
                    let _ = reply.send(cause);
                }
                Command::HandleEvent(event) => self.handle_event(event),
            }
        }
    }

    fn report_error(&mut self, apn: ApnId, error: IwlanError) -> i64 {
        let Some(error_type) = error.to_error_type_key() else {
            // NO_ERROR sentinel: clear the APN's policy state entirely.
            self.apns.remove(&apn);
            return -1;
        };

        let now = Instant::now();
        let (retry_array, unthrottle_events) = self.policy.resolve(&apn, &error_type);

        let state = self.apns.entry(apn).or_default();
        state.last_error = Some(error);
        let record = state
            .records
            .entry(error_type)
            .or_insert_with(|| Record {
                current_index: None,
                throttle_until: now,
                last_wait_seconds: -1,
                unthrottle_events: HashSet::new(),
            });
        // The policy resolved for this report governs future unthrottle
        // behaviour until the record is next reported on or reset.
        record.unthrottle_events = unthrottle_events;

        let next_index = match record.current_index {
            None => 0,
            Some(previous) => previous + 1,
        };

        if next_index >= retry_array.len() {
            // Exhausted: give up this cycle. No throttle window is
            // scheduled, so `canBringUpTunnel` is immediately true again
            // and the next report for this key restarts the backoff from
            // the top.
            record.current_index = None;
            record.throttle_until = now;
            record.last_wait_seconds = -1;
            state.last_wait_seconds = -1;
            return -1;
        }

        record.current_index = Some(next_index);
        let wait = retry_array[next_index];
        record.throttle_until = now + Duration::from_secs(wait);
        record.last_wait_seconds = wait as i64;
        state.last_wait_seconds = wait as i64;

        wait as i64
    }

    fn can_bring_up_tunnel(&self, apn: &ApnId) -> bool {
        let Some(state) = self.apns.get(apn) else {
            return true;
        };

        let now = Instant::now();
        state
            .records
            .values()
            .all(|record| now >= record.throttle_until)
    }

    fn current_retry_time_ms(&self, apn: &ApnId) -> i64 {
        let Some(state) = self.apns.get(apn) else {
            return -1;
        };

        if state.last_wait_seconds < 0 {
            state.last_wait_seconds
        } else {
            state.last_wait_seconds * 1000
        }
    }

    fn data_fail_cause(&self, apn: &ApnId) -> FailCause {
        let Some(state) = self.apns.get(apn) else {
            return FailCause::NONE;
        };

        state
            .last_error
            .map(FailCause::from_error)
            .unwrap_or(FailCause::NONE)
    }

    fn handle_event(&mut self, event: Event) {
        let now = Instant::now();

        for state in self.apns.values_mut() {
            for record in state.records.values_mut() {
                if record.unthrottle_events.contains(&event) {
                    record.current_index = None;
                    record.throttle_until = now;
                    record.last_wait_seconds = -1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyTable;
    use iwlan_types::GenericError;
    use std::time::Duration;

    fn ims_policy(json: &str) -> PolicyTable {
        PolicyTable::parse(json)
    }

    #[tokio::test(start_paused = true)]
    async fn retry_array_exhausts_to_give_up_then_restarts() {
        let engine = ErrorPolicyEngine::spawn();
        engine.set_policy(ims_policy(
            r#"[ { "ApnName": "ims", "ErrorTypes": [
                { "ErrorType": "IKE_PROTOCOL_ERROR_TYPE",
                  "ErrorDetails": ["24"],
                  "RetryArray": ["4", "8", "16"] } ] } ]"#,
        ));
        tokio::task::yield_now().await;

        let apn = ApnId::new("ims");
        let error = IwlanError::IkeProtocolError(24);

        assert_eq!(engine.report_error(apn.clone(), error).await, 4);
        assert_eq!(engine.report_error(apn.clone(), error).await, 8);
        assert_eq!(engine.report_error(apn.clone(), error).await, 16);
        // Exhausted: gives up rather than repeating the tail value.
        assert_eq!(engine.report_error(apn.clone(), error).await, -1);
        // Give-up clears the throttle window immediately.
        assert!(engine.can_bring_up_tunnel(apn.clone()).await);

        // The cycle restarts from the top on the next report.
        assert_eq!(engine.report_error(apn, error).await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_window_blocks_bring_up_until_it_elapses() {
        let engine = ErrorPolicyEngine::spawn();
        engine.set_policy(ims_policy(
            r#"[ { "ApnName": "ims", "ErrorTypes": [
                { "ErrorType": "GENERIC_ERROR_TYPE",
                  "ErrorDetails": ["AUTHENTICATION_FAILED"],
                  "RetryArray": ["5"] } ] } ]"#,
        ));
        tokio::task::yield_now().await;

        let apn = ApnId::new("ims");
        let error = IwlanError::GenericError(GenericError::AuthenticationFailed);

        assert_eq!(engine.report_error(apn.clone(), error).await, 5);
        assert!(!engine.can_bring_up_tunnel(apn.clone()).await);
        assert_eq!(engine.get_current_retry_time_ms(apn.clone()).await, 5_000);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(engine.can_bring_up_tunnel(apn).await);
    }

    #[tokio::test(start_paused = true)]
    async fn unthrottle_event_clears_the_window_early() {
        let engine = ErrorPolicyEngine::spawn();
        engine.set_policy(ims_policy(
            r#"[ { "ApnName": "ims", "ErrorTypes": [
                { "ErrorType": "GENERIC_ERROR_TYPE",
                  "ErrorDetails": ["AUTHENTICATION_FAILED"],
                  "RetryArray": ["60"],
                  "UnthrottlingEvents": ["WIFI_AP_CHANGED"] } ] } ]"#,
        ));
        tokio::task::yield_now().await;

        let apn = ApnId::new("ims");
        let error = IwlanError::GenericError(GenericError::AuthenticationFailed);

        engine.report_error(apn.clone(), error).await;
        assert!(!engine.can_bring_up_tunnel(apn.clone()).await);

        engine.handle_event(Event::WifiApChanged);
        tokio::task::yield_now().await;
        assert!(engine.can_bring_up_tunnel(apn).await);
    }

    #[tokio::test]
    async fn no_error_sentinel_clears_policy_state() {
        let engine = ErrorPolicyEngine::spawn();
        let apn = ApnId::new("ims");

        assert_eq!(
            engine
                .report_error(apn.clone(), IwlanError::IkeProtocolError(24))
                .await,
            5
        );
        assert_eq!(
            engine.report_error(apn.clone(), IwlanError::NoError).await,
            -1
        );
        assert!(engine.can_bring_up_tunnel(apn).await);
    }
}
