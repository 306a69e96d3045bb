//! Carrier-supplied JSON policy: parsing, matching selectors, and the
//! built-in fallback table.
//!
//! Any malformed `ErrorType` entry is discarded on its own; the surrounding
//! `ApnName` block and every other entry remain valid.

use std::collections::{HashMap, HashSet};

use iwlan_types::{ApnId, Event, ErrorTypeKey, GenericError, GenericErrorSelector, IkeErrorSelector};
use serde::Deserialize;

/// The hard-coded global default applied when nothing in the carrier's
/// policy matches a raised error, following the match/fallback ladder and
/// `fallback GENERIC → [5,10,15]` convention used throughout.
pub const GLOBAL_DEFAULT_RETRY_ARRAY: &[u64] = &[5, 10, 15];

#[derive(Debug, Clone)]
pub struct PolicyEntry {
    pub selectors: Vec<ErrorTypeKey>,
    pub retry_array: Vec<u64>,
    pub unthrottle_events: HashSet<Event>,
}

impl PolicyEntry {
    fn matches(&self, raised: &ErrorTypeKey) -> bool {
        self.selectors.iter().any(|selector| selector_matches(selector, raised))
    }

    fn is_generic_wildcard(&self) -> bool {
        self.selectors
            .iter()
            .any(|s| matches!(s, ErrorTypeKey::GenericError(GenericErrorSelector::Wildcard)))
    }
}

fn selector_matches(selector: &ErrorTypeKey, raised: &ErrorTypeKey) -> bool {
    match (selector, raised) {
        (ErrorTypeKey::IkeProtocolError(IkeErrorSelector::Wildcard), ErrorTypeKey::IkeProtocolError(_)) => true,
        (
            ErrorTypeKey::IkeProtocolError(IkeErrorSelector::Code(a)),
            ErrorTypeKey::IkeProtocolError(IkeErrorSelector::Code(b)),
        ) => a == b,
        (ErrorTypeKey::GenericError(GenericErrorSelector::Wildcard), ErrorTypeKey::GenericError(_)) => true,
        (
            ErrorTypeKey::GenericError(GenericErrorSelector::Known(a)),
            ErrorTypeKey::GenericError(GenericErrorSelector::Known(b)),
        ) => a == b,
        _ => false,
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    by_apn: HashMap<ApnId, Vec<PolicyEntry>>,
}

impl PolicyTable {
    /// Resolves the retry array and unthrottle-event set for a raised error
    /// on `apn`, applying the full match/fallback ladder:
    /// 1. the APN's entries in declaration order, first match wins;
    /// 2. the APN's generic-wildcard entry, regardless of the raised
    ///    error's own category;
    /// 3. the hard-coded global default.
    pub fn resolve(&self, apn: &ApnId, raised: &ErrorTypeKey) -> (Vec<u64>, HashSet<Event>) {
        if let Some(entries) = self.by_apn.get(apn) {
            if let Some(entry) = entries.iter().find(|e| e.matches(raised)) {
                return (entry.retry_array.clone(), entry.unthrottle_events.clone());
            }

            if let Some(entry) = entries.iter().find(|e| e.is_generic_wildcard()) {
                return (entry.retry_array.clone(), entry.unthrottle_events.clone());
            }
        }

        (GLOBAL_DEFAULT_RETRY_ARRAY.to_vec(), HashSet::new())
    }

    /// Parses the carrier-config JSON document.
    /// A malformed `ErrorType` entry is dropped; its siblings and the rest
    /// of the document still parse.
    pub fn parse(json: &str) -> PolicyTable {
        let raw: Vec<RawApnPolicy> = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(%error, "malformed carrier error-policy document, ignoring");
                return PolicyTable::default();
            }
        };

        let mut by_apn = HashMap::new();

        for apn_policy in raw {
            let apn = ApnId::new(apn_policy.apn_name);
            let mut entries = Vec::new();

            for raw_entry in apn_policy.error_types {
                match PolicyEntry::try_from(raw_entry) {
                    Ok(entry) => entries.push(entry),
                    Err(error) => {
                        tracing::warn!(%error, apn = %apn, "discarding malformed policy entry");
                    }
                }
            }

            by_apn.insert(apn, entries);
        }

        PolicyTable { by_apn }
    }
}

#[derive(Debug, Deserialize)]
struct RawApnPolicy {
    #[serde(rename = "ApnName")]
    apn_name: String,
    #[serde(rename = "ErrorTypes")]
    error_types: Vec<RawErrorType>,
}

#[derive(Debug, Deserialize)]
struct RawErrorType {
    #[serde(rename = "ErrorType")]
    error_type: String,
    #[serde(rename = "ErrorDetails")]
    error_details: Vec<String>,
    #[serde(rename = "RetryArray")]
    retry_array: Vec<String>,
    #[serde(rename = "UnthrottlingEvents", default)]
    unthrottling_events: Vec<String>,
    /// Operator annotation, accepted and ignored (original source tolerance
    /// for unknown-but-harmless keys).
    #[serde(rename = "Comment", default)]
    #[allow(dead_code)]
    comment: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyEntryError {
    #[error("unknown ErrorType {0:?}")]
    UnknownErrorType(String),
    #[error("ErrorDetails must not be empty")]
    EmptyErrorDetails,
    #[error("unrecognized error detail {0:?}")]
    UnrecognizedErrorDetail(String),
    #[error("RetryArray must not be empty")]
    EmptyRetryArray,
    #[error("RetryArray entry {0:?} is not a non-negative integer")]
    InvalidRetryValue(String),
}

impl TryFrom<RawErrorType> for PolicyEntry {
    type Error = PolicyEntryError;

    fn try_from(raw: RawErrorType) -> Result<Self, Self::Error> {
        if raw.error_details.is_empty() {
            return Err(PolicyEntryError::EmptyErrorDetails);
        }
        if raw.retry_array.is_empty() {
            return Err(PolicyEntryError::EmptyRetryArray);
        }

        let selectors = raw
            .error_details
            .iter()
            .map(|detail| parse_selector(&raw.error_type, detail))
            .collect::<Result<Vec<_>, _>>()?;

        let retry_array = raw
            .retry_array
            .iter()
            .map(|value| {
                value
                    .parse::<u64>()
                    .map_err(|_| PolicyEntryError::InvalidRetryValue(value.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let unthrottle_events = raw
            .unthrottling_events
            .iter()
            .filter_map(|name| match name.parse::<Event>() {
                Ok(event) => Some(event),
                Err(_) => {
                    tracing::debug!(name, "unknown unthrottling event name, dropping");
                    None
                }
            })
            .collect();

        Ok(PolicyEntry {
            selectors,
            retry_array,
            unthrottle_events,
        })
    }
}

fn parse_selector(error_type: &str, detail: &str) -> Result<ErrorTypeKey, PolicyEntryError> {
    match error_type {
        "IKE_PROTOCOL_ERROR_TYPE" => {
            if detail == "*" {
                Ok(ErrorTypeKey::IkeProtocolError(IkeErrorSelector::Wildcard))
            } else {
                let code = detail
                    .parse::<u16>()
                    .map_err(|_| PolicyEntryError::UnrecognizedErrorDetail(detail.to_string()))?;
                Ok(ErrorTypeKey::IkeProtocolError(IkeErrorSelector::Code(code)))
            }
        }
        "GENERIC_ERROR_TYPE" => {
            if detail == "*" {
                Ok(ErrorTypeKey::GenericError(GenericErrorSelector::Wildcard))
            } else {
                let name = generic_error_from_name(detail)
                    .ok_or_else(|| PolicyEntryError::UnrecognizedErrorDetail(detail.to_string()))?;
                Ok(ErrorTypeKey::GenericError(GenericErrorSelector::Known(name)))
            }
        }
        other => Err(PolicyEntryError::UnknownErrorType(other.to_string())),
    }
}

fn generic_error_from_name(name: &str) -> Option<GenericError> {
    Some(match name {
        "SERVER_SELECTION_FAILED" => GenericError::ServerSelectionFailed,
        "TUNNEL_TRANSFORM_FAILED" => GenericError::TunnelTransformFailed,
        "IKE_INTERNAL_IO_EXCEPTION" => GenericError::IkeInternalIoException,
        "IKE_NETWORK_LOST_EXCEPTION" => GenericError::IkeNetworkLostException,
        "AUTHENTICATION_FAILED" => GenericError::AuthenticationFailed,
        "PDN_CONNECTION_REJECTION" => GenericError::PdnConnectionRejection,
        "IKE_CONFIG_LOOKUP_FAILURE" => GenericError::IkeConfigLookupFailure,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use iwlan_types::IwlanError;

    #[test]
    fn malformed_entry_is_dropped_but_siblings_survive() {
        let json = r#"
        [ { "ApnName": "ims",
            "ErrorTypes": [
              { "ErrorType": "IKE_PROTOCOL_ERROR_TYPE",
                "ErrorDetails": ["24", "34"],
                "RetryArray": ["4", "8", "16"] },
              { "ErrorType": "NOT_A_REAL_TYPE",
                "ErrorDetails": ["1"],
                "RetryArray": ["1"] }
            ] } ]
        "#;

        let table = PolicyTable::parse(json);
        let apn = ApnId::new("ims");
        let raised = IwlanError::IkeProtocolError(24).to_error_type_key().unwrap();

        let (retry_array, _) = table.resolve(&apn, &raised);
        assert_eq!(retry_array, vec![4, 8, 16]);
    }

    #[test]
    fn falls_back_to_generic_wildcard_then_global_default() {
        let json = r#"
        [ { "ApnName": "ims",
            "ErrorTypes": [
              { "ErrorType": "GENERIC_ERROR_TYPE",
                "ErrorDetails": ["*"],
                "RetryArray": ["1", "2"] } ] } ]
        "#;

        let table = PolicyTable::parse(json);
        let apn = ApnId::new("ims");

        let raised = IwlanError::IkeProtocolError(999).to_error_type_key().unwrap();
        let (retry_array, _) = table.resolve(&apn, &raised);
        assert_eq!(retry_array, vec![1, 2]);

        let unconfigured_apn = ApnId::new("mms");
        let (retry_array, _) = table.resolve(&unconfigured_apn, &raised);
        assert_eq!(retry_array, GLOBAL_DEFAULT_RETRY_ARRAY.to_vec());
    }
}
