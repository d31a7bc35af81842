//! # Recurrence rules for scheduled workers.
//!
//! [`ScheduleRule`] is a pure description of when a worker fires next:
//! - [`ScheduleRule::TimeWindow`] — once per calendar day, at a uniformly
//!   random instant inside `[start, end)`; deterministic at exactly `start`
//!   when `start == end`.
//! - [`ScheduleRule::IntervalDays`] — every `days` days after the previous
//!   trigger.
//! - [`ScheduleRule::Immediate`] — after a short fixed delay; only used to
//!   compress multi-day schedules into seconds for debugging.
//!
//! Evaluating a rule never memoizes anything: the window draw is
//! re-randomized independently on each call, so successive days need not
//! trigger at the same time of day.

use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use rand::Rng;

/// Timing mode applied to every rule by the scheduling loops.
///
/// Compressed timing substitutes [`ScheduleRule::Immediate`] for each
/// worker's own rule without changing which workers are selected — a
/// three-day keep-alive and an evening check-in both fire seconds apart,
/// which is what schedule debugging needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timing {
    /// Use each worker's own rule.
    Real,
    /// Replace every rule with `Immediate { delay }`.
    Compressed {
        /// Fixed delay before each trigger.
        delay: StdDuration,
    },
}

impl Timing {
    /// Applies this mode to a worker's rule.
    pub fn apply(&self, rule: ScheduleRule) -> ScheduleRule {
        match self {
            Timing::Real => rule,
            Timing::Compressed { delay } => ScheduleRule::Immediate { delay: *delay },
        }
    }

    /// True for the compressed (debug) mode.
    pub fn is_compressed(&self) -> bool {
        matches!(self, Timing::Compressed { .. })
    }
}

/// Immutable recurrence policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleRule {
    /// One trigger per calendar day, random inside `[start, end)`.
    ///
    /// A reversed pair (`end < start`) is normalized by swapping.
    TimeWindow {
        /// Window opening clock time.
        start: NaiveTime,
        /// Window closing clock time (exclusive for the draw).
        end: NaiveTime,
    },

    /// One trigger every `days` days after the previous trigger.
    IntervalDays {
        /// Interval length in days.
        days: u32,
    },

    /// Fire after a short fixed delay (debug compression only).
    Immediate {
        /// Fixed delay before the trigger.
        delay: StdDuration,
    },
}

impl ScheduleRule {
    /// Computes the next trigger instant.
    ///
    /// - `TimeWindow`: next eligible day is today while the window's end
    ///   is still ahead, tomorrow otherwise. Evaluated mid-window, the
    ///   draw covers the remaining `[now, end)` slice so the returned
    ///   instant is never in the past.
    /// - `IntervalDays`: `previous + days`; with no previous trigger the
    ///   rule returns `now` and the caller applies its configured
    ///   [`FirstRun`](crate::FirstRun) policy.
    /// - `Immediate`: `now + delay`.
    pub fn next_trigger(
        &self,
        now: NaiveDateTime,
        previous: Option<NaiveDateTime>,
    ) -> NaiveDateTime {
        match self {
            ScheduleRule::TimeWindow { start, end } => {
                let (lo, hi) = if start <= end {
                    (*start, *end)
                } else {
                    (*end, *start)
                };
                if lo == hi {
                    let today_at = now.date().and_time(lo);
                    if today_at > now {
                        today_at
                    } else {
                        today_at + Duration::days(1)
                    }
                } else {
                    let (window_start, window_end) = if now.time() < hi {
                        (now.date().and_time(lo), now.date().and_time(hi))
                    } else {
                        (
                            now.date().and_time(lo) + Duration::days(1),
                            now.date().and_time(hi) + Duration::days(1),
                        )
                    };
                    let from = window_start.max(now);
                    let span = (window_end - from).num_seconds().max(1);
                    from + Duration::seconds(rand::rng().random_range(0..span))
                }
            }
            ScheduleRule::IntervalDays { days } => match previous {
                Some(previous) => previous + Duration::days(i64::from(*days)),
                None => now,
            },
            ScheduleRule::Immediate { delay } => {
                now + Duration::from_std(*delay).unwrap_or_else(|_| Duration::zero())
            }
        }
    }
}
