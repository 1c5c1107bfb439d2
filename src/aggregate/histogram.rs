use chrono::{DateTime, Duration, DurationRound, Utc};

/// Number of hourly buckets: the current hour plus the twelve before it.
pub const HISTOGRAM_BUCKETS: usize = 13;

/// Bucket start instants, oldest first.
///
/// `tz_offset_minutes` is the caller's offset east of UTC (CET = 60). The last
/// bucket starts at the top of the current hour as seen in that offset, which
/// differs from the UTC hour for half-hour zones.
pub fn hour_buckets(now: DateTime<Utc>, tz_offset_minutes: i32) -> Vec<DateTime<Utc>> {
    let offset = Duration::minutes(i64::from(tz_offset_minutes));
    let local = now + offset;
    let local_hour = local
        .duration_trunc(Duration::hours(1))
        .unwrap_or(local);
    let current = local_hour - offset;

    (0..HISTOGRAM_BUCKETS)
        .map(|i| current - Duration::hours((HISTOGRAM_BUCKETS - 1 - i) as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_buckets_anchor_on_current_hour() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 37, 12).unwrap();
        let buckets = hour_buckets(now, 0);

        assert_eq!(buckets.len(), HISTOGRAM_BUCKETS);
        assert_eq!(buckets[12], Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap());
        assert_eq!(buckets[0], Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap());
        for pair in buckets.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::hours(1));
        }
    }

    #[test]
    fn test_whole_hour_offset_matches_utc_hour() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 37, 0).unwrap();
        assert_eq!(hour_buckets(now, 120), hour_buckets(now, 0));
        assert_eq!(hour_buckets(now, -300), hour_buckets(now, 0));
    }

    #[test]
    fn test_half_hour_offset() {
        // 14:37 UTC is 20:07 in UTC+05:30, so the current bucket starts 20:00 local = 14:30 UTC
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 37, 0).unwrap();
        let buckets = hour_buckets(now, 330);
        assert_eq!(buckets[12], Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap());

        // 14:20 UTC is 19:50 local, so the current bucket starts 19:00 local = 13:30 UTC
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 20, 0).unwrap();
        let buckets = hour_buckets(now, 330);
        assert_eq!(buckets[12], Utc.with_ymd_and_hms(2024, 5, 1, 13, 30, 0).unwrap());
    }
}
