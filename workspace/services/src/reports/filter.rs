use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use crate::error::{Result, ServiceError};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest look-back accepted for `days`.
pub const MAX_DAYS: i64 = 36_500;

/// The time window a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// Every purchase ever made
    Unbounded,
    /// The last `days` days up to `now`
    LastDays { days: i64, since: DateTime<Utc> },
    /// From the start of `start` to the end of `end`, both days included
    Between { start: NaiveDate, end: NaiveDate },
}

impl DateFilter {
    /// Validates the raw query parameters.
    ///
    /// `days` cannot be combined with a date range, a range needs both ends
    /// and must run forward, and `days` must lie in `1..=MAX_DAYS`.
    pub fn from_params(
        days: Option<i64>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let start_date = start_date.filter(|s| !s.is_empty());
        let end_date = end_date.filter(|s| !s.is_empty());

        let filter = match (days, start_date, end_date) {
            (Some(_), Some(_), Some(_)) => {
                return Err(ServiceError::Conflict(
                    "startDate, endDate and days are conflicting parameters".to_string(),
                ));
            }
            (_, Some(_), None) | (_, None, Some(_)) => {
                return Err(ServiceError::Validation(
                    "startDate and endDate must be given together".to_string(),
                ));
            }
            (None, Some(start), Some(end)) => {
                let start = parse_date(start)?;
                let end = parse_date(end)?;
                if start >= end {
                    return Err(ServiceError::Conflict(
                        "Start date must be earlier than end date".to_string(),
                    ));
                }
                DateFilter::Between { start, end }
            }
            (Some(days), None, None) => {
                if days <= 0 || days > MAX_DAYS {
                    return Err(ServiceError::Validation(format!(
                        "days must be between 1 and {MAX_DAYS}"
                    )));
                }
                let since = Duration::try_days(days)
                    .and_then(|window| now.checked_sub_signed(window))
                    .ok_or_else(|| ServiceError::Validation("days is out of range".to_string()))?;
                DateFilter::LastDays { days, since }
            }
            (None, None, None) => DateFilter::Unbounded,
        };
        debug!("Report filter {:?}", filter);
        Ok(filter)
    }

    /// Inclusive lower bound.
    pub fn from(&self) -> Option<DateTime<Utc>> {
        match self {
            DateFilter::Unbounded => None,
            DateFilter::LastDays { since, .. } => Some(*since),
            DateFilter::Between { start, .. } => Some(start.and_time(NaiveTime::MIN).and_utc()),
        }
    }

    /// Exclusive upper bound: the midnight after `end` for a range.
    pub fn until(&self) -> Option<DateTime<Utc>> {
        match self {
            DateFilter::Between { end, .. } => end
                .succ_opt()
                .map(|next| next.and_time(NaiveTime::MIN).and_utc()),
            _ => None,
        }
    }

    /// Number of days the window spans, `None` when unbounded.
    pub fn span_days(&self) -> Option<i64> {
        match self {
            DateFilter::Unbounded => None,
            DateFilter::LastDays { days, .. } => Some(*days),
            DateFilter::Between { start, end } => Some((*end - *start).num_days() + 1),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from().is_none_or(|from| at >= from) && self.until().is_none_or(|until| at < until)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ServiceError::Validation(format!("Invalid date format: {raw}, expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_days_with_range_conflicts() {
        let err = DateFilter::from_params(Some(7), Some("2024-01-01"), Some("2024-02-01"), now()).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(
            DateFilter::from_params(None, Some("2024-01-01"), None, now()),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            DateFilter::from_params(None, Some("01.01.2024"), Some("2024-02-01"), now()),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            DateFilter::from_params(None, Some("2024-02-01"), Some("2024-02-01"), now()),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            DateFilter::from_params(Some(0), None, None, now()),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_oversized_days_rejected() {
        for days in [MAX_DAYS + 1, 1_000_000_000, i64::MAX] {
            assert!(matches!(
                DateFilter::from_params(Some(days), None, None, now()),
                Err(ServiceError::Validation(_))
            ));
        }
        let widest = DateFilter::from_params(Some(MAX_DAYS), None, None, now()).unwrap();
        assert_eq!(widest.span_days(), Some(MAX_DAYS));
    }

    #[test]
    fn test_range_ending_on_last_date_is_open() {
        let filter = DateFilter::Between {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::MAX,
        };
        assert_eq!(filter.until(), None);
        assert!(filter.contains(now()));
    }

    #[test]
    fn test_range_includes_end_day() {
        let filter = DateFilter::from_params(None, Some("2024-03-01"), Some("2024-03-31"), now()).unwrap();
        assert_eq!(filter.span_days(), Some(31));
        assert!(filter.contains(Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 0).unwrap()));
        assert!(!filter.contains(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
        assert!(!filter.contains(Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 0).unwrap()));
    }

    #[test]
    fn test_last_days_and_unbounded() {
        let filter = DateFilter::from_params(Some(10), None, None, now()).unwrap();
        assert_eq!(filter.from(), Some(now() - Duration::days(10)));
        assert_eq!(filter.until(), None);

        let all = DateFilter::from_params(None, None, None, now()).unwrap();
        assert_eq!(all, DateFilter::Unbounded);
        assert_eq!(all.span_days(), None);
        assert!(all.contains(Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap()));
    }
}
