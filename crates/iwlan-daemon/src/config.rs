//! Command-line surface and carrier-config ingestion.
//!
//! The daemon simulates the platform's `CARRIER_CONFIG_CHANGED` broadcast by
//! polling the configured JSON document's mtime, mirroring the
//! resolv.conf-watching polling loop `dns_control` uses on platforms with no
//! inotify-equivalent available to it.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use iwlan_error_policy::{ErrorPolicyEngine, PolicyTable};
use iwlan_event_bus::EventBus;
use iwlan_types::Event;

/// Command-line args for the iWLAN daemon.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File logging directory. Should be a path that's writeable by the current user.
    #[arg(short, long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to the carrier error-policy JSON document.
    #[arg(long, env = "IWLAN_CARRIER_CONFIG_PATH")]
    pub carrier_config_path: Option<PathBuf>,

    /// How often to poll `carrier_config_path` for changes.
    #[arg(long, env = "IWLAN_CARRIER_CONFIG_POLL_INTERVAL", default_value = "5s", value_parser = humantime_duration)]
    pub carrier_config_poll_interval: Duration,

    /// This slot's local address to bind outgoing ePDG DNS lookups to.
    #[arg(long, env = "IWLAN_BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    /// Whether this slot is the device's default data slot (transport gating).
    #[arg(long, env = "IWLAN_DEFAULT_DATA_SLOT", default_value_t = true)]
    pub is_default_data_slot: bool,

    /// Whether cross-SIM calling is enabled for this slot.
    #[arg(long, env = "IWLAN_CROSS_SIM_CALLING", default_value_t = false)]
    pub cross_sim_calling_enabled: bool,
}

fn humantime_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    value.parse::<humantime::Duration>().map(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn reloads_policy_and_publishes_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carrier_config.json");
        std::fs::write(&path, r#"{"rules":[]}"#).unwrap();

        let error_policy = ErrorPolicyEngine::spawn();
        let event_bus = EventBus::spawn();
        let (_sub_id, mut events_rx) = event_bus.subscribe([Event::CarrierConfigChanged]);

        tokio::spawn(watch_carrier_config(
            path.clone(),
            Duration::from_millis(10),
            error_policy,
            event_bus,
        ));

        let event = events_rx.recv().await.unwrap();
        assert_eq!(event, Event::CarrierConfigChanged);
    }

    #[test]
    fn parses_humantime_durations() {
        assert_eq!(humantime_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(humantime_duration("250ms").unwrap(), Duration::from_millis(250));
    }
}

/// Polls `path` for content changes, re-publishing [`Event::CarrierConfigChanged`]
/// and updating the Error Policy Engine's table on every change — the
/// configuration arrives as a JSON document and supersedes any previous
/// configuration atomically.
pub async fn watch_carrier_config(
    path: PathBuf,
    poll_interval: Duration,
    error_policy: ErrorPolicyEngine,
    event_bus: EventBus,
) {
    let mut last_contents: Option<String> = None;
    let mut interval = tokio::time::interval(poll_interval);

    loop {
        interval.tick().await;

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(error) => {
                tracing::debug!(%error, path = %path.display(), "failed to read carrier config, keeping previous policy");
                continue;
            }
        };

        if last_contents.as_deref() == Some(contents.as_str()) {
            continue;
        }

        let table = PolicyTable::parse(&contents);
        error_policy.set_policy(table);
        event_bus.publish(Event::CarrierConfigChanged);
        last_contents = Some(contents);

        tracing::info!(path = %path.display(), "carrier config reloaded");
    }
}
