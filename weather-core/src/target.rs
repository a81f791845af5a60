//! Upstream path segments (`location[/start[/end]]`) built from the inbound route.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const MAX_LAST_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("Location attribute cannot be empty")]
    EmptyLocation,

    #[error("Invalid {field} '{value}': expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS")]
    InvalidDate { field: &'static str, value: String },

    #[error("Start date cannot be greater than End date")]
    EndBeforeStart,

    #[error("last{{N}}days needs 1 <= N <= 365 and no end date")]
    InvalidLastDays,
}

/// Where, and for which period, weather is requested upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    location: String,
    start: Option<String>,
    end: Option<String>,
}

impl UpstreamTarget {
    /// Build from raw route segments. `today` anchors `last{N}days`.
    pub fn parse(
        location: &str,
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, TargetError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(TargetError::EmptyLocation);
        }

        let start = start.map(str::trim);
        let end = end.map(str::trim);

        if let Some(days) = start.and_then(last_days) {
            if end.is_some() || !(1..=MAX_LAST_DAYS).contains(&days) {
                return Err(TargetError::InvalidLastDays);
            }
            let from = today - Duration::days(days);
            return Ok(Self {
                location: location.to_string(),
                start: Some(from.format(DATE_FORMAT).to_string()),
                end: Some(today.format(DATE_FORMAT).to_string()),
            });
        }

        let start_at = start.map(|s| parse_moment("startDate", s)).transpose()?;
        let end_at = end.map(|s| parse_moment("endDate", s)).transpose()?;
        if let (Some(s), Some(e)) = (start_at, end_at) {
            if e < s {
                return Err(TargetError::EndBeforeStart);
            }
        }

        Ok(Self {
            location: location.to_string(),
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Path segments in upstream order; each is percent-encoded when joined.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.location.as_str())
            .chain(self.start.as_deref())
            .chain(self.end.as_deref())
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.segments().collect();
        f.write_str(&joined.join("/"))
    }
}

fn last_days(segment: &str) -> Option<i64> {
    let lower = segment.to_ascii_lowercase();
    let digits = lower.strip_prefix("last")?.strip_suffix("days")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Overflowing counts are out of range either way.
    Some(digits.parse().unwrap_or(i64::MAX))
}

fn parse_moment(field: &'static str, value: &str) -> Result<NaiveDateTime, TargetError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(value, DATE_FORMAT).map(|d| d.and_time(Default::default()))
        })
        .map_err(|_| TargetError::InvalidDate { field, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn location_only() {
        let t = UpstreamTarget::parse(" London,UK ", None, None, today()).unwrap();
        assert_eq!(t.to_string(), "London,UK");
    }

    #[test]
    fn blank_location_is_rejected() {
        assert_eq!(
            UpstreamTarget::parse("  ", None, None, today()).unwrap_err(),
            TargetError::EmptyLocation
        );
    }

    #[test]
    fn start_and_end_dates() {
        let t = UpstreamTarget::parse("Paris", Some("2024-01-01"), Some("2024-01-07"), today())
            .unwrap();
        assert_eq!(t.segments().collect::<Vec<_>>(), vec!["Paris", "2024-01-01", "2024-01-07"]);
    }

    #[test]
    fn datetime_start_is_accepted() {
        assert!(UpstreamTarget::parse("Paris", Some("2024-01-01T13:00:00"), None, today()).is_ok());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = UpstreamTarget::parse("Paris", Some("2024-01-07"), Some("2024-01-01"), today())
            .unwrap_err();
        assert_eq!(err, TargetError::EndBeforeStart);
    }

    #[test]
    fn garbage_date_is_rejected() {
        let err = UpstreamTarget::parse("Paris", Some("yesterday-ish"), None, today()).unwrap_err();
        assert!(matches!(err, TargetError::InvalidDate { field: "startDate", .. }));
    }

    #[test]
    fn last_n_days_expands_to_a_range() {
        let t = UpstreamTarget::parse("Oslo", Some("last7days"), None, today()).unwrap();
        assert_eq!(t.to_string(), "Oslo/2024-03-03/2024-03-10");
    }

    #[test]
    fn last_n_days_bounds() {
        for bad in ["last0days", "last366days", "last99999999999999999999days"] {
            assert_eq!(
                UpstreamTarget::parse("Oslo", Some(bad), None, today()).unwrap_err(),
                TargetError::InvalidLastDays,
                "{bad}"
            );
        }
        assert_eq!(
            UpstreamTarget::parse("Oslo", Some("last3days"), Some("2024-01-01"), today())
                .unwrap_err(),
            TargetError::InvalidLastDays
        );
    }
}
