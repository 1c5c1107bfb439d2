use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Lookback window for Top-N queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeRange {
    #[default]
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour2,
    Hour6,
    Hour12,
    Hour24,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Min5 => "5m",
            TimeRange::Min15 => "15m",
            TimeRange::Min30 => "30m",
            TimeRange::Hour1 => "1h",
            TimeRange::Hour2 => "2h",
            TimeRange::Hour6 => "6h",
            TimeRange::Hour12 => "12h",
            TimeRange::Hour24 => "24h",
        }
    }

    pub fn duration_secs(&self) -> i64 {
        match self {
            TimeRange::Min5 => 5 * 60,
            TimeRange::Min15 => 15 * 60,
            TimeRange::Min30 => 30 * 60,
            TimeRange::Hour1 => 60 * 60,
            TimeRange::Hour2 => 2 * 60 * 60,
            TimeRange::Hour6 => 6 * 60 * 60,
            TimeRange::Hour12 => 12 * 60 * 60,
            TimeRange::Hour24 => 24 * 60 * 60,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs())
    }

    /// Unknown strings fall back to 5m, as subscribers expect.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    pub fn all() -> [TimeRange; 8] {
        [
            TimeRange::Min5,
            TimeRange::Min15,
            TimeRange::Min30,
            TimeRange::Hour1,
            TimeRange::Hour2,
            TimeRange::Hour6,
            TimeRange::Hour12,
            TimeRange::Hour24,
        ]
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::all()
            .into_iter()
            .find(|range| range.as_str() == s)
            .ok_or_else(|| format!("unknown time range: {}", s))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TimeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| TimeRange::parse_lenient(&s)).unwrap_or_default())
    }
}
