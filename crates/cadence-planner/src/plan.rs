//! Weekly plan parsing and date-range expansion.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::PlannerError;

/// Wire shape of a weekly plan: either a 7-element list indexed Monday=0, or
/// a map keyed by weekday name or index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeeklyPlanInput {
    List(Vec<i64>),
    Map(HashMap<String, i64>),
}

/// Validated posts-per-weekday plan, indexed Monday=0 .. Sunday=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyPlan([u32; 7]);

const WEEKDAY_NAMES: &[(&str, usize)] = &[
    ("mon", 0),
    ("monday", 0),
    ("tue", 1),
    ("tuesday", 1),
    ("wed", 2),
    ("wednesday", 2),
    ("thu", 3),
    ("thursday", 3),
    ("fri", 4),
    ("friday", 4),
    ("sat", 5),
    ("saturday", 5),
    ("sun", 6),
    ("sunday", 6),
];

impl WeeklyPlan {
    /// Validate a wire-shape plan. Missing weekdays default to 0; anything
    /// malformed is a validation error with no state change.
    pub fn parse(input: &WeeklyPlanInput) -> Result<Self, PlannerError> {
        match input {
            WeeklyPlanInput::List(values) => {
                if values.len() != 7 {
                    return Err(PlannerError::InvalidPlan(format!(
                        "list must have 7 entries (Mon..Sun), got {}",
                        values.len()
                    )));
                }
                let mut counts = [0u32; 7];
                for (i, v) in values.iter().enumerate() {
                    counts[i] = validate_count(*v)?;
                }
                Ok(Self(counts))
            }
            WeeklyPlanInput::Map(entries) => {
                let mut counts = [0u32; 7];
                for (key, v) in entries {
                    let idx = weekday_index(key)?;
                    counts[idx] = validate_count(*v)?;
                }
                Ok(Self(counts))
            }
        }
    }

    /// Requested posts for a weekday index (Monday=0).
    pub fn count_at(&self, weekday: usize) -> u32 {
        self.0.get(weekday).copied().unwrap_or(0)
    }

    /// Requested posts for a calendar day.
    pub fn count_for(&self, day: NaiveDate) -> u32 {
        self.count_at(day.weekday().num_days_from_monday() as usize)
    }

    /// Total posts requested across one week.
    pub fn weekly_total(&self) -> u32 {
        self.0.iter().sum()
    }
}

fn validate_count(v: i64) -> Result<u32, PlannerError> {
    u32::try_from(v)
        .map_err(|_| PlannerError::InvalidPlan(format!("counts must be >= 0, got {v}")))
}

fn weekday_index(key: &str) -> Result<usize, PlannerError> {
    let normalized = key.trim().to_ascii_lowercase();

    if let Ok(idx) = normalized.parse::<i64>() {
        return if (0..=6).contains(&idx) {
            Ok(idx as usize)
        } else {
            Err(PlannerError::InvalidPlan(format!(
                "weekday index must be 0..6 (Mon..Sun), got {idx}"
            )))
        };
    }

    WEEKDAY_NAMES
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, idx)| *idx)
        .ok_or_else(|| PlannerError::InvalidPlan(format!("weekday key {key:?} not recognized")))
}

/// Expand an inclusive date range into a day list.
pub fn day_list(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, PlannerError> {
    if end < start {
        return Err(PlannerError::InvalidRange);
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}
