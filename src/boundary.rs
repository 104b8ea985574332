//! Retention boundary computation.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::RotationError;

/// Compute the instant before which a backup counts as outdated.
///
/// The boundary is `now - retention_seconds`, subtracted as an absolute
/// duration so calendar and DST transitions cannot shift it.
pub fn outdated_boundary(
    retention_seconds: i64,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, RotationError> {
    if retention_seconds < 1 {
        return Err(RotationError::invalid_config(format!(
            "backup retention must be larger than 0 seconds, got {}",
            retention_seconds
        )));
    }

    let retention = TimeDelta::try_seconds(retention_seconds).ok_or_else(|| {
        RotationError::invalid_config(format!(
            "backup retention of {} seconds is out of range",
            retention_seconds
        ))
    })?;

    now.checked_sub_signed(retention).ok_or_else(|| {
        RotationError::invalid_config(format!(
            "backup retention of {} seconds reaches before the earliest representable time",
            retention_seconds
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_seven_day_boundary() {
        let boundary = outdated_boundary(604_800, utc("2024-01-10T00:00:00Z")).unwrap();
        assert_eq!(boundary, utc("2024-01-03T00:00:00Z"));
    }

    #[test]
    fn test_boundary_is_exact_subtraction() {
        let now = utc("2024-03-01T12:34:56.789Z");
        for seconds in [1_i64, 59, 3_601, 86_399, 2_678_400, 31_536_000] {
            let boundary = outdated_boundary(seconds, now).unwrap();
            assert_eq!((now - boundary).num_seconds(), seconds);
            assert_eq!(boundary.timestamp_subsec_millis(), 789);
        }
    }

    #[test]
    fn test_boundary_across_month_end() {
        // 2024-03-01 minus one day lands on the leap day.
        let boundary = outdated_boundary(86_400, utc("2024-03-01T00:00:00Z")).unwrap();
        assert_eq!(boundary, utc("2024-02-29T00:00:00Z"));
    }

    #[test]
    fn test_boundary_across_dst_transition() {
        // US DST started 2024-03-10 02:00 local (-05:00 -> -04:00).
        let eastern_dst = FixedOffset::west_opt(4 * 3600).unwrap();
        let now = eastern_dst
            .with_ymd_and_hms(2024, 3, 11, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);

        let boundary = outdated_boundary(2 * 86_400, now).unwrap();

        assert_eq!((now - boundary).num_seconds(), 172_800);
        assert_eq!(boundary, utc("2024-03-09T16:00:00Z"));
    }

    #[test]
    fn test_zero_retention_is_invalid() {
        let err = outdated_boundary(0, Utc::now()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_negative_retention_is_invalid() {
        let err = outdated_boundary(-60, Utc::now()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_overflowing_retention_is_invalid() {
        let err = outdated_boundary(i64::MAX, Utc::now()).unwrap_err();
        assert!(err.is_configuration());
    }
}
