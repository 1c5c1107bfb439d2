//! Read-side queries over the retention store
//!
//! Everything here runs on pooled query-only connections; the async wrappers
//! move the SQLite work onto the blocking thread pool.

use super::histogram::hour_buckets;
use super::{Scope, TimeRange};
use crate::clock::Clock;
use crate::store::{run_blocking, Directory, ReadPool, StoreError};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const TOP_N_LIMIT: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSummary {
    pub destination_id: Option<i64>,
    pub destination_name: Option<String>,
    pub count: i64,
    pub total_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBucket {
    /// Bucket start, Unix milliseconds.
    pub time_interval: i64,
    pub count: i64,
}

/// Top destinations by call count since `since`, one row per destination.
///
/// The name is the greatest feed-supplied name in the window, else the
/// directory name. `destinations = Some(ids)` restricts to those ids; an empty slice yields nothing.
pub fn query_top_destinations(
    conn: &Connection,
    since: DateTime<Utc>,
    destinations: Option<&[i64]>,
) -> Result<Vec<DestinationSummary>, StoreError> {
    let filter = match destinations {
        Some([]) => return Ok(Vec::new()),
        Some(ids) => format!(
            "AND c.destination_id IN ({})",
            vec!["?"; ids.len()].join(", ")
        ),
        None => String::new(),
    };

    let sql = format!(
        r#"
        SELECT
            c.destination_id,
            COALESCE(MAX(c.destination_name), MAX(t.name)) AS display_name,
            COUNT(*) AS call_count,
            COALESCE(SUM(c.duration), 0.0) AS total_duration
        FROM calls c
        LEFT JOIN talkgroups t ON t.talkgroup = CAST(c.destination_id AS TEXT)
        WHERE c.timestamp >= ? {}
        GROUP BY c.destination_id
        ORDER BY call_count DESC, c.destination_id ASC, display_name ASC
        LIMIT {}
        "#,
        filter, TOP_N_LIMIT
    );

    let bind = std::iter::once(since.timestamp_millis())
        .chain(destinations.unwrap_or(&[]).iter().copied());

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), |row| {
            Ok(DestinationSummary {
                destination_id: row.get(0)?,
                destination_name: row.get(1)?,
                count: row.get(2)?,
                total_duration: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Dense hourly counts for one destination; `buckets` are consecutive hour starts.
pub fn query_histogram(
    conn: &Connection,
    destination_id: i64,
    buckets: &[DateTime<Utc>],
) -> Result<Vec<HistogramBucket>, StoreError> {
    let mut histogram: Vec<HistogramBucket> = buckets
        .iter()
        .map(|start| HistogramBucket {
            time_interval: start.timestamp_millis(),
            count: 0,
        })
        .collect();

    let (first, last) = match (buckets.first(), buckets.last()) {
        (Some(first), Some(last)) => (first.timestamp_millis(), (*last + Duration::hours(1)).timestamp_millis()),
        _ => return Ok(histogram),
    };

    let mut stmt = conn.prepare(
        r#"
        SELECT (timestamp - ?1) / 3600000 AS slot, COUNT(*)
        FROM calls
        WHERE destination_id = ?2 AND timestamp >= ?1 AND timestamp < ?3
        GROUP BY slot
        "#,
    )?;
    let counts = stmt
        .query_map(params![first, destination_id, last], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (slot, count) in counts {
        if let Some(bucket) = usize::try_from(slot).ok().and_then(|i| histogram.get_mut(i)) {
            bucket.count = count;
        }
    }

    Ok(histogram)
}

#[derive(Clone)]
pub struct AggregationEngine {
    readers: Arc<ReadPool>,
    directory: Directory,
    clock: Clock,
}

impl AggregationEngine {
    pub fn new(readers: Arc<ReadPool>, directory: Directory, clock: Clock) -> Self {
        Self {
            readers,
            directory,
            clock,
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn top_destinations_blocking(
        &self,
        range: TimeRange,
        scope: &Scope,
    ) -> Result<Vec<DestinationSummary>, StoreError> {
        let since = (self.clock)() - range.duration();

        let destinations = match scope.directory_country() {
            Some(country) => Some(self.directory.destination_ids_for_country(country)?),
            None => None,
        };

        self.readers
            .with_conn(|conn| query_top_destinations(conn, since, destinations.as_deref()))
    }

    pub fn hourly_histogram_blocking(
        &self,
        destination_id: i64,
        tz_offset_minutes: i32,
    ) -> Result<Vec<HistogramBucket>, StoreError> {
        let buckets = hour_buckets((self.clock)(), tz_offset_minutes);
        self.readers
            .with_conn(|conn| query_histogram(conn, destination_id, &buckets))
    }

    pub async fn top_destinations(
        &self,
        range: TimeRange,
        scope: Scope,
    ) -> Result<Vec<DestinationSummary>, StoreError> {
        let engine = self.clone();
        run_blocking(move || engine.top_destinations_blocking(range, &scope)).await
    }

    pub async fn hourly_histogram(
        &self,
        destination_id: i64,
        tz_offset_minutes: i32,
    ) -> Result<Vec<HistogramBucket>, StoreError> {
        let engine = self.clone();
        run_blocking(move || engine.hourly_histogram_blocking(destination_id, tz_offset_minutes)).await
    }
}
