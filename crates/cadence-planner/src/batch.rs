//! Batch commit: orchestrates slot placement against persisted capacity.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cadence_model::{NewPost, PipelineConfig, PostKind};
use cadence_store::BookingStore;

use crate::plan::{day_list, WeeklyPlan, WeeklyPlanInput};
use crate::report::ReportSink;
use crate::slots::{autoshift, has_conflict, random_slots, spread};
use crate::window::{resolve_timezone, window_for};
use crate::PlannerError;

/// Media reference used when a batch has no media pool.
const PLACEHOLDER_MEDIA: &str = "/media/placeholder.png";

/// How candidate times are generated within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SlotMode {
    /// Even spread across the configured posting window.
    Even,
    /// Uniform-random placement, optionally narrowed to a sub-window.
    Random {
        start_hour: Option<u8>,
        end_hour: Option<u8>,
    },
}

/// A batch commit (or preflight) request.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub account_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weekly_plan: WeeklyPlanInput,
    /// IANA timezone the weekly plan is expressed in.
    pub timezone: String,
    /// Overrides the configured minimum spacing when set.
    pub min_spacing_minutes: Option<i64>,
    /// Relocate conflicting candidates instead of rejecting them.
    pub autoshift: bool,
    /// Free capacity by cancelling newest existing bookings when a day is
    /// over the daily limit.
    pub override_conflicts: bool,
    /// Media pool assigned round-robin to generated posts.
    pub media_urls: Vec<String>,
    pub kind: PostKind,
    pub caption: String,
    pub mode: SlotMode,
    /// Global cap on posts created by this batch.
    pub content_budget: Option<usize>,
    /// Part of the batch identity: idempotency keys are
    /// `batch_{batch_epoch}_{index}`, so resubmitting the same request
    /// (same epoch) updates rather than duplicates.
    pub batch_epoch: i64,
}

impl BatchRequest {
    /// A plain photo batch with defaults matching the common case.
    pub fn new(
        account_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        weekly_plan: WeeklyPlanInput,
        timezone: impl Into<String>,
        batch_epoch: i64,
    ) -> Self {
        Self {
            account_id,
            start_date,
            end_date,
            weekly_plan,
            timezone: timezone.into(),
            min_spacing_minutes: None,
            autoshift: true,
            override_conflicts: false,
            media_urls: Vec::new(),
            kind: PostKind::Photo,
            caption: String::new(),
            mode: SlotMode::Even,
            content_budget: None,
            batch_epoch,
        }
    }
}

/// Why a requested slot was not realized as a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Day already at the daily limit.
    DailyCap,
    /// Autoshift exhausted its search radius.
    NoSlot,
    /// Strict mode rejected a spacing conflict.
    Conflict,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::DailyCap => "daily_cap",
            SkipReason::NoSlot => "no_slot",
            SkipReason::Conflict => "conflict",
        }
    }
}

/// Structured record explaining a skipped slot; never silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipEntry {
    pub date: NaiveDate,
    pub reason: SkipReason,
    pub intended_local_time: NaiveDateTime,
    pub intended_utc_time: DateTime<Utc>,
    pub media_url: String,
    pub note: String,
}

/// Per-day created/requested accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayResult {
    pub date: NaiveDate,
    pub requested: usize,
    pub created: usize,
}

/// Outcome of a batch commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub created: usize,
    pub created_ids: Vec<i64>,
    pub per_day: Vec<DayResult>,
    pub skipped: Vec<SkipEntry>,
    /// Downloadable skip report, when a sink was provided and anything was
    /// skipped.
    pub report_url: Option<String>,
}

/// Outcome of a read-only preflight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightOutcome {
    pub slots: Vec<DateTime<Utc>>,
    pub conflicts: Vec<DateTime<Utc>>,
}

/// Orchestrates the slot planner against persisted capacity and performs the
/// idempotent bulk insert.
pub struct BatchCommitter<'a, S> {
    store: &'a S,
    config: &'a PipelineConfig,
}

impl<'a, S: BookingStore> BatchCommitter<'a, S> {
    pub fn new(store: &'a S, config: &'a PipelineConfig) -> Self {
        Self { store, config }
    }

    /// Create posts per the weekly plan between the request dates.
    ///
    /// Capacity is enforced per local calendar day. With
    /// `override_conflicts`, the newest existing bookings in an over-full
    /// day are cancelled to restore room. Every unrealized slot becomes a
    /// [`SkipEntry`].
    pub async fn commit(
        &self,
        req: &BatchRequest,
        report: Option<&dyn ReportSink>,
    ) -> Result<BatchOutcome, PlannerError> {
        let plan = WeeklyPlan::parse(&req.weekly_plan)?;
        let days = day_list(req.start_date, req.end_date)?;
        let tz = resolve_timezone(&req.timezone)?;
        let spacing = req
            .min_spacing_minutes
            .unwrap_or(self.config.min_spacing_minutes);

        let mut content_remaining = req.content_budget.unwrap_or(usize::MAX);
        let mut created_ids: Vec<i64> = Vec::new();
        let mut per_day: Vec<DayResult> = Vec::new();
        let mut skipped: Vec<SkipEntry> = Vec::new();
        let mut idx_global: usize = 0;

        for day in days {
            let requested = plan.count_for(day) as usize;
            if requested == 0 {
                continue;
            }

            let window = window_for(day, tz, self.config.day_start_hour, self.config.day_end_hour);
            let existing_count = self
                .store
                .committed_count(req.account_id, window.start_utc(), window.end_utc())
                .await?;
            let mut room = self.config.daily_limit.saturating_sub(existing_count);

            if req.override_conflicts
                && existing_count + requested > self.config.daily_limit
                && existing_count > 0
            {
                let need = existing_count + requested - self.config.daily_limit;
                let canceled = self
                    .store
                    .cancel_newest(req.account_id, window.start_utc(), window.end_utc(), need)
                    .await?;
                info!(account_id = req.account_id, %day, canceled, "freed capacity for batch");
                room = self.config.daily_limit;
            }

            let proposed = self.candidates_for_day(&req.mode, day, tz, requested as u32);

            let to_try = requested.min(room).min(content_remaining);
            let take = to_try.min(proposed.len());
            let candidates = &proposed[..take];
            let overflow = &proposed[take..];

            for (i, local) in overflow.iter().enumerate() {
                skipped.push(SkipEntry {
                    date: day,
                    reason: SkipReason::DailyCap,
                    intended_local_time: local.naive_local(),
                    intended_utc_time: local.with_timezone(&Utc),
                    media_url: media_at(&req.media_urls, created_ids.len() + i),
                    note: format!("Limit {}/day", self.config.daily_limit),
                });
            }

            if take == 0 {
                per_day.push(DayResult {
                    date: day,
                    requested,
                    created: 0,
                });
                continue;
            }

            let existing_times = self
                .store
                .committed_times(req.account_id, window.start_utc(), window.end_utc())
                .await?;
            let candidates_utc: Vec<DateTime<Utc>> =
                candidates.iter().map(|t| t.with_timezone(&Utc)).collect();

            let placed = if req.autoshift {
                let result = autoshift(&window, &candidates_utc, &existing_times, spacing);
                for (j, bad) in result.unplaced.iter().enumerate() {
                    skipped.push(SkipEntry {
                        date: day,
                        reason: SkipReason::NoSlot,
                        intended_local_time: bad.with_timezone(&tz).naive_local(),
                        intended_utc_time: *bad,
                        media_url: media_at(&req.media_urls, created_ids.len() + j),
                        note: "Could not fit within window with spacing".to_string(),
                    });
                }
                result.placed
            } else {
                let mut ok = Vec::new();
                for (j, t) in candidates_utc.iter().enumerate() {
                    if has_conflict(*t, &existing_times, spacing) {
                        skipped.push(SkipEntry {
                            date: day,
                            reason: SkipReason::Conflict,
                            intended_local_time: candidates[j].naive_local(),
                            intended_utc_time: *t,
                            media_url: media_at(&req.media_urls, created_ids.len() + j),
                            note: "Conflicts with existing post".to_string(),
                        });
                    } else {
                        ok.push(*t);
                    }
                }
                ok
            };

            let mut created_today = 0usize;
            for t in &placed {
                if content_remaining == 0 {
                    break;
                }
                let post = NewPost {
                    account_id: req.account_id,
                    kind: req.kind,
                    media_url: media_at(&req.media_urls, created_ids.len()),
                    caption: req.caption.clone(),
                    scheduled_at: *t,
                    client_request_id: Some(format!(
                        "batch_{}_{:06}",
                        req.batch_epoch, idx_global
                    )),
                };
                idx_global += 1;

                let outcome = self.store.insert_post(&post).await?;
                created_ids.push(outcome.id());
                created_today += 1;
                content_remaining -= 1;
            }

            debug!(%day, requested, created = created_today, "batch day committed");
            per_day.push(DayResult {
                date: day,
                requested,
                created: created_today,
            });

            if content_remaining == 0 {
                break;
            }
        }

        let report_url = match (report, skipped.is_empty()) {
            (Some(sink), false) => match sink.write(&skipped).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(error = %e, "failed to write skip report");
                    None
                }
            },
            _ => None,
        };

        info!(
            account_id = req.account_id,
            created = created_ids.len(),
            skipped = skipped.len(),
            "batch commit finished"
        );

        Ok(BatchOutcome {
            created: created_ids.len(),
            created_ids,
            per_day,
            skipped,
            report_url,
        })
    }

    /// Simulate placement without touching the store: no inserts, no
    /// override cancellations.
    pub async fn preflight(&self, req: &BatchRequest) -> Result<PreflightOutcome, PlannerError> {
        let plan = WeeklyPlan::parse(&req.weekly_plan)?;
        let days = day_list(req.start_date, req.end_date)?;
        let tz = resolve_timezone(&req.timezone)?;
        let spacing = req
            .min_spacing_minutes
            .unwrap_or(self.config.min_spacing_minutes);

        let mut content_remaining = req.content_budget.unwrap_or(usize::MAX);
        let mut slots: Vec<DateTime<Utc>> = Vec::new();
        let mut conflicts: Vec<DateTime<Utc>> = Vec::new();

        for day in days {
            let requested = plan.count_for(day);
            if requested == 0 {
                continue;
            }

            let window = window_for(day, tz, self.config.day_start_hour, self.config.day_end_hour);
            let existing_times = self
                .store
                .committed_times(req.account_id, window.start_utc(), window.end_utc())
                .await?;
            let proposed = self.candidates_for_day(&req.mode, day, tz, requested);
            let proposed_utc: Vec<DateTime<Utc>> =
                proposed.iter().map(|t| t.with_timezone(&Utc)).collect();

            let (mut placed, bad) = if req.autoshift {
                let result = autoshift(&window, &proposed_utc, &existing_times, spacing);
                (result.placed, result.unplaced)
            } else {
                let (ok, bad): (Vec<_>, Vec<_>) = proposed_utc
                    .into_iter()
                    .partition(|t| !has_conflict(*t, &existing_times, spacing));
                (ok, bad)
            };

            placed.truncate(content_remaining);
            content_remaining -= placed.len();
            slots.extend(placed);
            conflicts.extend(bad);

            if content_remaining == 0 {
                break;
            }
        }

        Ok(PreflightOutcome { slots, conflicts })
    }

    fn candidates_for_day(
        &self,
        mode: &SlotMode,
        day: NaiveDate,
        tz: Tz,
        requested: u32,
    ) -> Vec<chrono::DateTime<Tz>> {
        match mode {
            SlotMode::Even => {
                let window =
                    window_for(day, tz, self.config.day_start_hour, self.config.day_end_hour);
                spread(&window, requested)
            }
            SlotMode::Random {
                start_hour,
                end_hour,
            } => {
                let window = window_for(
                    day,
                    tz,
                    start_hour.unwrap_or(self.config.day_start_hour),
                    end_hour.unwrap_or(self.config.day_end_hour),
                );
                let mut rng = rand::rng();
                random_slots(&window, requested, &mut rng)
            }
        }
    }
}

fn media_at(media: &[String], idx: usize) -> String {
    if media.is_empty() {
        PLACEHOLDER_MEDIA.to_string()
    } else {
        media[idx % media.len()].clone()
    }
}
