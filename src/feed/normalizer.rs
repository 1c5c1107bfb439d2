//! Call-detail normalization from raw feed payloads to `CallRecord`
//!
//! Pure: no I/O, the processing clock is passed in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Destination ids the network reserves for local echo / parrot tests.
pub const LOCAL_ECHO_DESTINATIONS: [i64; 2] = [8, 9];

/// Calls shorter than this (seconds, source clock) are noise.
pub const MIN_DURATION_SECS: f64 = 2.0;

/// Canonical call record, as persisted and as pushed on the firehose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Normalizer clock at processing time, never a source field.
    pub timestamp: DateTime<Utc>,
    pub link_name: Option<String>,
    pub slot: Option<i64>,
    pub source_id: Option<i64>,
    pub destination_id: Option<i64>,
    pub route: Option<String>,
    pub link_call: Option<String>,
    pub session_type: Option<i64>,
    pub source_name: Option<String>,
    pub destination_call: Option<String>,
    pub destination_name: Option<String>,
    pub state: Option<i64>,
    pub start: f64,
    pub stop: f64,
    pub rssi: Option<String>,
    pub ber: Option<f64>,
    pub reflector_id: Option<i64>,
    pub link_type: Option<i64>,
    pub call_types: Option<String>,
    pub loss_count: Option<i64>,
    pub total_count: Option<i64>,
    pub master: Option<i64>,
    pub talker_alias: Option<String>,
    pub flag_set: Option<i64>,
    pub event: Option<String>,
    pub link_type_name: Option<String>,
    pub context_id: Option<i64>,
    pub session_id: Option<String>,
    pub source_call: Option<String>,
    /// `stop - start`, always >= `MIN_DURATION_SECS` on a kept record.
    pub duration: f64,
}

/// A persisted record together with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCall {
    pub id: i64,
    #[serde(flatten)]
    pub record: CallRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// `Stop` missing, unparsable or exactly 0 (call still in progress).
    NoStop,
    /// Destination is one of `LOCAL_ECHO_DESTINATIONS`.
    LocalEcho,
    /// `DestinationCall` present and non-empty (private call).
    DirectCall,
    /// Duration unavailable or below `MIN_DURATION_SECS`.
    TooShort,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NoStop => "no_stop",
            DropReason::LocalEcho => "local_echo",
            DropReason::DirectCall => "direct_call",
            DropReason::TooShort => "too_short",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Kept(CallRecord),
    Dropped(DropReason),
}

impl Normalized {
    pub fn kept(self) -> Option<CallRecord> {
        match self {
            Normalized::Kept(record) => Some(record),
            Normalized::Dropped(_) => None,
        }
    }
}

/// Apply coercion and drop rules to one payload.
pub fn normalize(payload: &Map<String, Value>, now: DateTime<Utc>) -> Normalized {
    let field = |name: &str| payload.get(name);

    let stop = match field("Stop").and_then(number) {
        Some(stop) if stop != 0.0 => stop,
        _ => return Normalized::Dropped(DropReason::NoStop),
    };

    let destination_id = field("DestinationID").and_then(integer);
    if matches!(destination_id, Some(id) if LOCAL_ECHO_DESTINATIONS.contains(&id)) {
        return Normalized::Dropped(DropReason::LocalEcho);
    }

    // Literal rule: a non-empty DestinationCall marks the event as a private call.
    let destination_call = field("DestinationCall").and_then(text);
    if destination_call.is_some() {
        return Normalized::Dropped(DropReason::DirectCall);
    }

    let start = match field("Start").and_then(number) {
        Some(start) => start,
        None => return Normalized::Dropped(DropReason::TooShort),
    };
    let duration = stop - start;
    if duration < MIN_DURATION_SECS {
        return Normalized::Dropped(DropReason::TooShort);
    }

    Normalized::Kept(CallRecord {
        // Stored at millisecond precision; the firehose copy must match.
        timestamp: DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now),
        link_name: field("LinkName").and_then(text),
        slot: field("Slot").and_then(integer),
        source_id: field("SourceID").and_then(integer),
        destination_id,
        route: field("Route").and_then(text),
        link_call: field("LinkCall").and_then(text),
        session_type: field("SessionType").and_then(integer),
        source_name: field("SourceName").and_then(text),
        destination_call,
        destination_name: field("DestinationName").and_then(text),
        state: field("State").and_then(integer),
        start,
        stop,
        rssi: field("RSSI").and_then(text),
        ber: field("BER").and_then(number),
        reflector_id: field("ReflectorID").and_then(integer),
        link_type: field("LinkType").and_then(integer),
        call_types: field("CallTypes").and_then(joined_list),
        loss_count: field("LossCount").and_then(integer),
        total_count: field("TotalCount").and_then(integer),
        master: field("Master").and_then(integer),
        talker_alias: field("TalkerAlias").and_then(text),
        flag_set: field("FlagSet").and_then(integer),
        event: field("Event").and_then(text),
        link_type_name: field("LinkTypeName").and_then(text),
        context_id: field("ContextID").and_then(integer),
        session_id: field("SessionID").and_then(text),
        source_call: field("SourceCall").and_then(text),
        duration,
    })
}

/// Numbers pass through, numeric strings are parsed, everything else is absent.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Like `number`, but fractional values are absent.
pub fn integer(value: &Value) -> Option<i64> {
    let n = number(value)?;
    if n.fract() != 0.0 || n < i64::MIN as f64 || n > i64::MAX as f64 {
        return None;
    }
    Some(n as i64)
}

/// Non-empty strings; numbers are rendered as text.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn joined_list(value: &Value) -> Option<String> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
    )
}
