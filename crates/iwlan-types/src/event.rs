use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The closed set of events the Event Bus fans out.
///
/// The JSON carrier-config policy names unthrottling events by string; the
/// mapping from name to variant is an exhaustive match, not dynamic
/// dispatch, and unknown names are dropped rather than erroring
/// design notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    CarrierConfigChanged,
    ApmEnable,
    ApmDisable,
    WifiDisable,
    WifiApChanged,
    WifiCallingEnable,
    WifiCallingDisable,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::CarrierConfigChanged => "CARRIER_CONFIG_CHANGED",
            Event::ApmEnable => "APM_ENABLE_EVENT",
            Event::ApmDisable => "APM_DISABLE_EVENT",
            Event::WifiDisable => "WIFI_DISABLE_EVENT",
            Event::WifiApChanged => "WIFI_AP_CHANGED",
            Event::WifiCallingEnable => "WIFI_CALLING_ENABLE_EVENT",
            Event::WifiCallingDisable => "WIFI_CALLING_DISABLE_EVENT",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string does not name a known [`Event`].
///
/// Callers parsing the unthrottling-event vocabulary from carrier JSON
/// should treat this as "drop the name", not as a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownEvent;

impl FromStr for Event {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CARRIER_CONFIG_CHANGED" => Event::CarrierConfigChanged,
            "APM_ENABLE_EVENT" => Event::ApmEnable,
            "APM_DISABLE_EVENT" => Event::ApmDisable,
            "WIFI_DISABLE_EVENT" => Event::WifiDisable,
            "WIFI_AP_CHANGED" => Event::WifiApChanged,
            "WIFI_CALLING_ENABLE_EVENT" => Event::WifiCallingEnable,
            "WIFI_CALLING_DISABLE_EVENT" => Event::WifiCallingDisable,
            _ => return Err(UnknownEvent),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_events() {
        for event in [
            Event::CarrierConfigChanged,
            Event::ApmEnable,
            Event::ApmDisable,
            Event::WifiDisable,
            Event::WifiApChanged,
            Event::WifiCallingEnable,
            Event::WifiCallingDisable,
        ] {
            assert_eq!(event.as_str().parse::<Event>().unwrap(), event);
        }
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        assert_eq!("NOT_A_REAL_EVENT".parse::<Event>(), Err(UnknownEvent));
    }
}
