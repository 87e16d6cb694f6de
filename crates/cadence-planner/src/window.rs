//! Local posting windows in absolute time.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::PlannerError;

/// A local calendar day's posting window as a half-open absolute interval
/// `[start, end)`, with the local wall-clock endpoints retained for
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl DayWindow {
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.with_timezone(&Utc)
    }

    /// Half-open containment: `start <= t < end`.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start_utc() <= t && t < self.end_utc()
    }

    /// Window length in whole minutes; also the autoshift search radius.
    pub fn span_minutes(&self) -> i64 {
        (self.end_utc() - self.start_utc()).num_minutes()
    }

    /// Clamp an instant into `[start, end - 1min]`, keeping rounded
    /// candidates inside the half-open window.
    pub fn clamp(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        let floor = self.start;
        let ceil = self.end - Duration::minutes(1);
        t.max(floor).min(ceil)
    }
}

/// Parse an IANA timezone name.
pub fn resolve_timezone(name: &str) -> Result<Tz, PlannerError> {
    name.parse::<Tz>()
        .map_err(|_| PlannerError::UnknownTimezone(name.to_string()))
}

/// Compute the absolute window for a local day and hour bounds. The end is
/// exclusive; if the end does not land after the start the window collapses
/// to a 1-minute interval so no caller ever sees an empty or inverted range.
pub fn window_for(day: NaiveDate, tz: Tz, start_hour: u8, end_hour: u8) -> DayWindow {
    let start_naive = day.and_time(local_time(start_hour));
    let end_naive = day.and_time(local_time(end_hour));

    let start = resolve_local(tz, start_naive);
    let mut end = resolve_local(tz, end_naive);
    if end <= start {
        end = start + Duration::minutes(1);
    }

    DayWindow { start, end }
}

fn local_time(hour: u8) -> NaiveTime {
    // Hours out of range clamp to end-of-day rather than panicking.
    NaiveTime::from_hms_opt(u32::from(hour.min(23)), 0, 0)
        .unwrap_or(NaiveTime::MIN)
}

/// Resolve a local wall-clock time to an instant. Ambiguous times (DST
/// fall-back) take the earlier offset; nonexistent times (spring-forward
/// gap) shift one hour later.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive).earliest() {
        Some(t) => t,
        None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_is_half_open() {
        let w = window_for(date(2024, 6, 3), chrono_tz::UTC, 8, 22);
        assert!(w.contains(w.start_utc()));
        assert!(!w.contains(w.end_utc()));
        assert_eq!(w.span_minutes(), 14 * 60);
    }

    #[test]
    fn test_window_respects_timezone_offset() {
        // New York is UTC-4 in June.
        let w = window_for(date(2024, 6, 3), chrono_tz::America::New_York, 8, 22);
        assert_eq!(w.start_utc().hour(), 12);
        assert_eq!(w.start.hour(), 8);
    }

    #[test]
    fn test_inverted_window_collapses_to_one_minute() {
        let w = window_for(date(2024, 6, 3), chrono_tz::UTC, 22, 8);
        assert_eq!(w.span_minutes(), 1);
        assert!(w.end > w.start);
    }

    #[test]
    fn test_equal_bounds_collapse_to_one_minute() {
        let w = window_for(date(2024, 6, 3), chrono_tz::UTC, 10, 10);
        assert_eq!(w.span_minutes(), 1);
    }

    #[test]
    fn test_spring_forward_gap_shifts_later() {
        // US DST 2024: 02:00 local on Mar 10 does not exist in New York.
        let w = window_for(date(2024, 3, 10), chrono_tz::America::New_York, 2, 5);
        assert_eq!(w.start.hour(), 3);
        assert!(w.end > w.start);
    }

    #[test]
    fn test_clamp_keeps_instants_inside() {
        let w = window_for(date(2024, 6, 3), chrono_tz::UTC, 8, 22);
        let before = w.start - Duration::hours(1);
        let after = w.end + Duration::hours(1);

        assert_eq!(w.clamp(before), w.start);
        assert_eq!(w.clamp(after), w.end - Duration::minutes(1));
        assert!(w.contains(w.clamp(after).with_timezone(&Utc)));
    }

    #[test]
    fn test_unknown_timezone_is_a_validation_error() {
        assert!(matches!(
            resolve_timezone("Mars/Olympus_Mons"),
            Err(PlannerError::UnknownTimezone(_))
        ));
        assert!(resolve_timezone("Europe/Berlin").is_ok());
    }
}
