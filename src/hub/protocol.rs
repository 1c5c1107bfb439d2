//! Subscriber wire protocol: JSON text frames `{"event": ..., "data": ...}`

use crate::aggregate::{DestinationSummary, HistogramBucket, TimeRange};
use crate::feed::normalizer::integer;
use crate::feed::StoredCall;
use crate::store::LabeledOption;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    GetContinents,
    GetCountries {
        continent: String,
    },
    GetTalkgroups {
        continent: Option<String>,
        country: Option<String>,
    },
    GetGroupedData {
        time_range: TimeRange,
        continent: Option<String>,
        country: Option<String>,
    },
    GetTalkgroupHistogram {
        talkgroup: i64,
        timezone_offset: i32,
    },
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeoSelection {
    continent: Option<String>,
    country: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct GroupedSelection {
    time_range: TimeRange,
    continent: Option<String>,
    country: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistogramSelection {
    talkgroup: Value,
    #[serde(default)]
    timezone_offset: Value,
}

fn data_or_default<T: Default + for<'de> Deserialize<'de>>(data: Value) -> Result<T, String> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data).map_err(|e| format!("invalid data: {}", e))
}

impl ClientRequest {
    /// Decode one client text frame.
    pub fn parse(text: &str) -> Result<Self, String> {
        let frame: Frame = serde_json::from_str(text).map_err(|e| format!("unparsable frame: {}", e))?;

        match frame.event.as_str() {
            "getContinents" => Ok(ClientRequest::GetContinents),
            "getCountries" => {
                let geo: GeoSelection = data_or_default(frame.data)?;
                Ok(ClientRequest::GetCountries {
                    continent: geo.continent.unwrap_or_default(),
                })
            }
            "getTalkgroups" => {
                let geo: GeoSelection = data_or_default(frame.data)?;
                Ok(ClientRequest::GetTalkgroups {
                    continent: geo.continent,
                    country: geo.country,
                })
            }
            "getGroupedData" => {
                let grouped: GroupedSelection = data_or_default(frame.data)?;
                Ok(ClientRequest::GetGroupedData {
                    time_range: grouped.time_range,
                    continent: grouped.continent,
                    country: grouped.country,
                })
            }
            "getTalkgroupHistogram" => {
                let selection: HistogramSelection =
                    serde_json::from_value(frame.data).map_err(|e| format!("invalid data: {}", e))?;
                let talkgroup = integer(&selection.talkgroup)
                    .ok_or_else(|| format!("invalid talkgroup: {}", selection.talkgroup))?;
                let timezone_offset = integer(&selection.timezone_offset)
                    .and_then(|n| i32::try_from(n).ok())
                    .unwrap_or(0);
                Ok(ClientRequest::GetTalkgroupHistogram {
                    talkgroup,
                    timezone_offset,
                })
            }
            other => Err(format!("unknown event: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerPush {
    Continents(Vec<String>),
    Countries(Vec<LabeledOption>),
    Talkgroups(Vec<LabeledOption>),
    BrandmeisterData(StoredCall),
    GroupedData(Vec<DestinationSummary>),
    TalkgroupHistogram(Vec<HistogramBucket>),
    Error { message: String },
}

impl ServerPush {
    pub fn error(message: impl Into<String>) -> Self {
        ServerPush::Error {
            message: message.into(),
        }
    }
}

/// `brandmeisterData` frame for the firehose, serialized once per record.
pub fn firehose_frame(call: &StoredCall) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServerPush::BrandmeisterData(call.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_requests() {
        assert_eq!(
            ClientRequest::parse(r#"{"event":"getContinents"}"#).unwrap(),
            ClientRequest::GetContinents
        );
        assert_eq!(
            ClientRequest::parse(r#"{"event":"getCountries","data":{"continent":"Europe"}}"#).unwrap(),
            ClientRequest::GetCountries { continent: "Europe".to_string() }
        );
        assert_eq!(
            ClientRequest::parse(r#"{"event":"getGroupedData","data":{"timeRange":"1h","continent":"Global","country":""}}"#)
                .unwrap(),
            ClientRequest::GetGroupedData {
                time_range: TimeRange::Hour1,
                continent: Some("Global".to_string()),
                country: Some(String::new()),
            }
        );
    }

    #[test]
    fn test_grouped_data_defaults() {
        assert_eq!(
            ClientRequest::parse(r#"{"event":"getGroupedData","data":{"timeRange":"3d"}}"#).unwrap(),
            ClientRequest::GetGroupedData { time_range: TimeRange::Min5, continent: None, country: None }
        );
        assert_eq!(
            ClientRequest::parse(r#"{"event":"getGroupedData"}"#).unwrap(),
            ClientRequest::GetGroupedData { time_range: TimeRange::Min5, continent: None, country: None }
        );
    }

    #[test]
    fn test_histogram_talkgroup_string_or_number() {
        let expected = ClientRequest::GetTalkgroupHistogram { talkgroup: 91, timezone_offset: 120 };
        assert_eq!(
            ClientRequest::parse(r#"{"event":"getTalkgroupHistogram","data":{"talkgroup":"91","timezoneOffset":120}}"#)
                .unwrap(),
            expected
        );
        assert_eq!(
            ClientRequest::parse(r#"{"event":"getTalkgroupHistogram","data":{"talkgroup":91,"timezoneOffset":120}}"#)
                .unwrap(),
            expected
        );
        assert!(ClientRequest::parse(r#"{"event":"getTalkgroupHistogram","data":{"talkgroup":"abc"}}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_frames() {
        assert!(ClientRequest::parse("not json").is_err());
        assert!(ClientRequest::parse(r#"{"event":"dropTables"}"#).is_err());
        assert!(ClientRequest::parse(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn test_server_push_shape() {
        let push = ServerPush::GroupedData(vec![DestinationSummary {
            destination_id: Some(91),
            destination_name: Some("Worldwide".to_string()),
            count: 3,
            total_duration: 17.5,
        }]);
        assert_eq!(
            serde_json::to_value(&push).unwrap(),
            json!({
                "event": "groupedData",
                "data": [{"destinationId": 91, "destinationName": "Worldwide", "count": 3, "totalDuration": 17.5}]
            })
        );

        assert_eq!(
            serde_json::to_value(ServerPush::error("boom")).unwrap(),
            json!({"event": "error", "data": {"message": "boom"}})
        );
        assert_eq!(
            serde_json::to_value(ServerPush::TalkgroupHistogram(vec![HistogramBucket { time_interval: 1000, count: 2 }]))
                .unwrap(),
            json!({"event": "talkgroupHistogram", "data": [{"timeInterval": 1000, "count": 2}]})
        );
    }
}
