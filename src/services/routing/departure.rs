//! Departure time normalization
//!
//! Never fails: a missing time means today's default departure, a parseable
//! time is floored to a 15 minute bucket, anything else means "now".

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::defaults::{default_departure_time, DEPARTURE_BUCKET_SECS};

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Departure parameter sent to the traffic-aware matrix queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Departure {
    /// Bucketed epoch seconds
    At(i64),
    /// Immediate departure
    Now,
}

impl Departure {
    pub fn normalize(input: Option<&str>) -> Self {
        Self::normalize_at(input, Local::now())
    }

    /// Same as [`Departure::normalize`] with an explicit clock
    pub fn normalize_at(input: Option<&str>, now: DateTime<Local>) -> Self {
        match input.map(str::trim).filter(|s| !s.is_empty()) {
            None => Departure::At(default_epoch(now)),
            Some(text) => match parse_epoch(text) {
                Some(epoch) => {
                    Departure::At(epoch.div_euclid(DEPARTURE_BUCKET_SECS) * DEPARTURE_BUCKET_SECS)
                }
                None => Departure::Now,
            },
        }
    }

    /// `departure_time` query value
    pub fn query_value(&self) -> String {
        match self {
            Departure::At(epoch) => epoch.to_string(),
            Departure::Now => "now".to_string(),
        }
    }

    /// Epoch actually used, resolving `Now` against `now`
    pub fn epoch_or(&self, now: i64) -> i64 {
        match self {
            Departure::At(epoch) => *epoch,
            Departure::Now => now,
        }
    }
}

/// Today's default departure (07:30 local) as epoch seconds
pub fn default_epoch(now: DateTime<Local>) -> i64 {
    let naive = now.date_naive().and_time(default_departure_time());
    local_epoch(&naive).unwrap_or_else(|| now.timestamp())
}

/// ISO-8601-ish text to epoch seconds; naive times are local
pub fn parse_epoch(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt.timestamp());
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return local_epoch(&naive);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| local_epoch(&naive))
}

fn local_epoch(naive: &NaiveDateTime) -> Option<i64> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.timestamp())
}

/// Local ISO-8601 rendering of an epoch, for echoing back to callers
pub fn local_iso(epoch: i64) -> String {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed_now() -> DateTime<Local> {
        Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2026, 3, 2)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
            )
            .earliest()
            .unwrap()
    }

    #[test]
    fn test_missing_time_defaults_to_morning_departure() {
        let expected = Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2026, 3, 2)
                    .unwrap()
                    .and_hms_opt(7, 30, 0)
                    .unwrap(),
            )
            .earliest()
            .unwrap()
            .timestamp();

        assert_eq!(Departure::normalize_at(None, fixed_now()), Departure::At(expected));
        assert_eq!(Departure::normalize_at(Some("  "), fixed_now()), Departure::At(expected));
    }

    #[test]
    fn test_offset_time_is_floored_to_bucket() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 2, 7, 30, 0).unwrap().timestamp();

        assert_eq!(
            Departure::normalize_at(Some("2026-03-02T07:44:59Z"), fixed_now()),
            Departure::At(expected)
        );
        assert_eq!(
            Departure::normalize_at(Some("2026-03-02T10:30+03:00"), fixed_now()),
            Departure::At(expected)
        );
    }

    #[test]
    fn test_naive_time_is_local() {
        let expected = Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2026, 3, 2)
                    .unwrap()
                    .and_hms_opt(6, 45, 0)
                    .unwrap(),
            )
            .earliest()
            .unwrap()
            .timestamp();

        assert_eq!(
            Departure::normalize_at(Some("2026-03-02T06:52"), fixed_now()),
            Departure::At(expected)
        );
        assert_eq!(
            Departure::normalize_at(Some("2026-03-02 06:45:00"), fixed_now()),
            Departure::At(expected)
        );
    }

    #[test]
    fn test_unparseable_time_means_now() {
        assert_eq!(Departure::normalize_at(Some("tomorrow-ish"), fixed_now()), Departure::Now);
        assert_eq!(Departure::Now.query_value(), "now");
        assert_eq!(Departure::Now.epoch_or(42), 42);
    }

    #[test]
    fn test_query_value_is_epoch() {
        assert_eq!(Departure::At(1_772_436_600).query_value(), "1772436600");
    }

    #[test]
    fn test_bucket_floor_is_euclidean() {
        assert_eq!(parse_epoch("1969-12-31T23:59:59Z"), Some(-1));
        assert_eq!(
            Departure::normalize_at(Some("1969-12-31T23:59:59Z"), fixed_now()),
            Departure::At(-900)
        );
    }
}
