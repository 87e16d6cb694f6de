//! Candidate placement: even spread, random placement, conflict detection,
//! and the bounded autoshift search.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use rand::Rng;

use crate::DayWindow;

/// Granularity candidates are rounded to.
const ROUND_MINUTES: i64 = 15;

/// Autoshift step size in minutes.
const SHIFT_STEP_MINUTES: i64 = 5;

/// Evenly spread `count` candidates across the window, one at each interior
/// boundary of `count + 1` equal segments (keeping candidates off the window
/// edges), rounded to the nearest 15-minute mark with ties rounding up,
/// clamped into the window. Rounding can collide neighbors, so the output
/// may be shorter than `count`.
pub fn spread(window: &DayWindow, count: u32) -> Vec<DateTime<Tz>> {
    if count == 0 {
        return Vec::new();
    }

    let total_secs = (window.end - window.start).num_seconds();
    let step = total_secs as f64 / f64::from(count + 1);

    let mut out: Vec<DateTime<Tz>> = Vec::with_capacity(count as usize);
    let mut seen = std::collections::HashSet::new();
    for i in 1..=count {
        let offset = Duration::seconds((step * f64::from(i)) as i64);
        let rounded = window.clamp(round_to_quarter_hour(window.start + offset));
        if seen.insert((rounded.hour(), rounded.minute())) {
            out.push(rounded);
        }
    }
    out
}

/// Place `count` candidates uniformly at random inside the window, truncated
/// to whole minutes, sorted, deduplicated. Used by randomized batch commit,
/// typically with a narrowed sub-window.
pub fn random_slots<R: Rng>(window: &DayWindow, count: u32, rng: &mut R) -> Vec<DateTime<Tz>> {
    if count == 0 {
        return Vec::new();
    }

    let span_secs = (window.end - window.start).num_seconds().max(1);
    let mut out: Vec<DateTime<Tz>> = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = rng.random_range(0..span_secs);
        let t = window.start + Duration::seconds(offset);
        // Whole-minute placement.
        let t = t - Duration::seconds(i64::from(t.second()));
        out.push(window.clamp(t));
    }
    out.sort();
    out.dedup();
    out
}

/// True iff any existing instant lies strictly within `min_spacing_minutes`
/// of the candidate. Symmetric; instants exactly `min_spacing_minutes` apart
/// do not conflict.
pub fn has_conflict(
    candidate: DateTime<Utc>,
    existing: &[DateTime<Utc>],
    min_spacing_minutes: i64,
) -> bool {
    let pad = Duration::minutes(min_spacing_minutes);
    existing.iter().any(|t| (candidate - *t).abs() < pad)
}

/// Outcome of an autoshift pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoshiftResult {
    /// Accepted instants, in acceptance order.
    pub placed: Vec<DateTime<Utc>>,
    /// Candidates that exhausted the search radius, at their original times.
    pub unplaced: Vec<DateTime<Utc>>,
}

/// Place each candidate, relocating conflicted ones with a bounded local
/// search: outward in 5-minute steps, trying later before earlier at each
/// radius, accepting the first in-window instant free of conflicts against
/// both existing commitments and everything placed earlier in this call.
/// The later-first order is a deliberate tie-break; tests depend on it.
pub fn autoshift(
    window: &DayWindow,
    candidates: &[DateTime<Utc>],
    existing: &[DateTime<Utc>],
    min_spacing_minutes: i64,
) -> AutoshiftResult {
    let mut placed: Vec<DateTime<Utc>> = Vec::with_capacity(candidates.len());
    let mut unplaced: Vec<DateTime<Utc>> = Vec::new();

    let conflicted = |t: DateTime<Utc>, placed: &[DateTime<Utc>]| {
        has_conflict(t, existing, min_spacing_minutes)
            || has_conflict(t, placed, min_spacing_minutes)
    };

    for &base in candidates {
        if window.contains(base) && !conflicted(base, &placed) {
            placed.push(base);
            continue;
        }

        let mut found = false;
        let mut radius = SHIFT_STEP_MINUTES;
        while radius < window.span_minutes() {
            for sign in [1i64, -1] {
                let shifted = base + Duration::minutes(sign * radius);
                if window.contains(shifted) && !conflicted(shifted, &placed) {
                    placed.push(shifted);
                    found = true;
                    break;
                }
            }
            if found {
                break;
            }
            radius += SHIFT_STEP_MINUTES;
        }

        if !found {
            unplaced.push(base);
        }
    }

    AutoshiftResult { placed, unplaced }
}

/// Round to the nearest 15-minute mark; exact midpoints round up.
fn round_to_quarter_hour(t: DateTime<Tz>) -> DateTime<Tz> {
    let discard = i64::from(t.minute()) % ROUND_MINUTES;
    let down = t
        - Duration::minutes(discard)
        - Duration::seconds(i64::from(t.second()))
        - Duration::nanoseconds(i64::from(t.nanosecond()));
    let up = down + Duration::minutes(ROUND_MINUTES);
    if t - down >= up - t { up } else { down }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window_for;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn window() -> DayWindow {
        window_for(
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            chrono_tz::UTC,
            8,
            22,
        )
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_spread_zero_is_empty() {
        assert!(spread(&window(), 0).is_empty());
    }

    #[test]
    fn test_spread_stays_inside_window_and_off_edges() {
        let w = window();
        for count in 1..=20u32 {
            let slots = spread(&w, count);
            assert!(slots.len() <= count as usize);
            for s in &slots {
                let utc = s.with_timezone(&Utc);
                assert!(w.contains(utc), "slot {utc} outside window");
            }
        }
    }

    #[test]
    fn test_spread_slots_are_distinct_and_sorted() {
        let slots = spread(&window(), 5);
        let mut sorted = slots.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(slots, sorted);
    }

    #[test]
    fn test_spread_rounds_to_quarter_hours() {
        for s in spread(&window(), 7) {
            assert_eq!(s.minute() % 15, 0, "slot {s} not on a 15-minute mark");
            assert_eq!(s.second(), 0);
        }
    }

    #[test]
    fn test_spread_two_on_a_fourteen_hour_window() {
        // 8:00..22:00 split into 3 segments: boundaries at 12:40 and 17:20,
        // rounded to 12:45 and 17:15.
        let slots = spread(&window(), 2);
        assert_eq!(slots.len(), 2);
        assert_eq!((slots[0].hour(), slots[0].minute()), (12, 45));
        assert_eq!((slots[1].hour(), slots[1].minute()), (17, 15));
    }

    #[test]
    fn test_rounding_midpoint_rounds_up() {
        let w = window();
        // 09:07:30 is exactly between 09:00 and 09:15.
        let t = w.start + Duration::minutes(67) + Duration::seconds(30);
        let rounded = round_to_quarter_hour(t);
        assert_eq!((rounded.hour(), rounded.minute()), (9, 15));
    }

    #[test]
    fn test_conflict_boundary_is_exclusive() {
        let existing = vec![at(12, 0)];
        assert!(has_conflict(at(12, 14), &existing, 15));
        assert!(!has_conflict(at(12, 15), &existing, 15));
        assert!(has_conflict(at(11, 46), &existing, 15));
        assert!(!has_conflict(at(11, 45), &existing, 15));
    }

    #[test]
    fn test_zero_spacing_never_conflicts() {
        let existing = vec![at(12, 0)];
        assert!(!has_conflict(at(12, 0), &existing, 0));
    }

    #[test]
    fn test_autoshift_is_identity_on_clean_input() {
        let w = window();
        let candidates = vec![at(10, 0), at(14, 0), at(18, 0)];
        let result = autoshift(&w, &candidates, &[], 15);
        assert_eq!(result.placed, candidates);
        assert!(result.unplaced.is_empty());
    }

    #[test]
    fn test_autoshift_moves_later_first() {
        let w = window();
        let existing = vec![at(12, 0)];
        let result = autoshift(&w, &[at(12, 0)], &existing, 15);
        // First conflict-free radius is 15 minutes; later wins the tie.
        assert_eq!(result.placed, vec![at(12, 15)]);
        assert!(result.unplaced.is_empty());
    }

    #[test]
    fn test_autoshift_falls_back_earlier_when_later_blocked() {
        let w = window();
        // Everything from 12:00 onward is blocked at 15-minute spacing.
        let existing: Vec<_> = (0..60).map(|i| at(12, 0) + Duration::minutes(i * 10)).collect();
        let result = autoshift(&w, &[at(12, 0)], &existing, 15);
        assert_eq!(result.placed.len(), 1);
        assert!(result.placed[0] < at(12, 0));
    }

    #[test]
    fn test_autoshift_respects_placements_within_call() {
        let w = window();
        // Two identical candidates; the second must shift away from the first.
        let result = autoshift(&w, &[at(12, 0), at(12, 0)], &[], 15);
        assert_eq!(result.placed.len(), 2);
        assert!(!has_conflict(result.placed[1], &result.placed[..1], 15));
    }

    #[test]
    fn test_autoshift_reports_unplaced_when_day_is_full() {
        // A collapsed 1-minute window with the slot already taken.
        let w = window_for(
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            chrono_tz::UTC,
            10,
            10,
        );
        let taken = w.start_utc();
        let result = autoshift(&w, &[taken], &[taken], 15);
        assert!(result.placed.is_empty());
        assert_eq!(result.unplaced, vec![taken]);
    }

    #[test]
    fn test_random_slots_respect_sub_window() {
        let sub = window_for(
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            chrono_tz::UTC,
            18,
            21,
        );
        let mut rng = rand::rng();
        for _ in 0..50 {
            for s in random_slots(&sub, 3, &mut rng) {
                assert!(sub.contains(s.with_timezone(&Utc)));
                assert_eq!(s.second(), 0);
            }
        }
    }

    #[test]
    fn test_random_slots_zero_is_empty() {
        let mut rng = rand::rng();
        assert!(random_slots(&window(), 0, &mut rng).is_empty());
    }

    proptest! {
        // Everything autoshift places is inside the window and respects
        // spacing against both existing instants and other placements.
        #[test]
        fn autoshift_placements_always_respect_spacing(
            candidate_mins in proptest::collection::vec(0i64..840, 0..8),
            existing_mins in proptest::collection::vec(0i64..840, 0..8),
            spacing in 0i64..120,
        ) {
            let w = window();
            let candidates: Vec<_> =
                candidate_mins.iter().map(|m| w.start_utc() + Duration::minutes(*m)).collect();
            let existing: Vec<_> =
                existing_mins.iter().map(|m| w.start_utc() + Duration::minutes(*m)).collect();

            let result = autoshift(&w, &candidates, &existing, spacing);

            prop_assert_eq!(
                result.placed.len() + result.unplaced.len(),
                candidates.len()
            );
            for (i, p) in result.placed.iter().enumerate() {
                prop_assert!(w.contains(*p));
                prop_assert!(!has_conflict(*p, &existing, spacing));
                let others: Vec<_> = result
                    .placed
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, t)| *t)
                    .collect();
                prop_assert!(!has_conflict(*p, &others, spacing));
            }
        }

        // Spread never exceeds the requested count and always lands on
        // 15-minute marks inside the window.
        #[test]
        fn spread_is_bounded_and_aligned(count in 0u32..30) {
            let w = window();
            let slots = spread(&w, count);
            prop_assert!(slots.len() <= count as usize);
            for s in slots {
                prop_assert!(w.contains(s.with_timezone(&Utc)));
                prop_assert_eq!(s.minute() % 15, 0);
            }
        }
    }
}
