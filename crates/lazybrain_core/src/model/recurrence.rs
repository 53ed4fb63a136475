//! Recurrence rules and successor computation.
//!
//! # Responsibility
//! - Compute the next occurrence date for a completed recurring item.
//! - Spawn the successor item that replaces a completed template.
//!
//! # Invariants
//! - `next_occurrence` is a pure function of the rule and a from-date.
//! - Dates that would land on a non-existent calendar day clamp to the
//!   last valid day of that month, never error.
//! - Biweekly cadence is anchored on `last_fired` to avoid drift.

use crate::model::item::{CapturedItem, ItemStatus};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordinal position of a weekday within a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordinal {
    First,
    Second,
    Third,
    Fourth,
    Last,
}

impl Ordinal {
    fn index(self) -> u32 {
        match self {
            Self::First => 0,
            Self::Second => 1,
            Self::Third => 2,
            Self::Fourth => 3,
            // Resolved against the actual month length.
            Self::Last => 4,
        }
    }
}

/// Supported recurrence cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly { weekday: Weekday },
    Biweekly { weekday: Weekday },
    MonthlyByDate { day: u8 },
    MonthlyByOrdinal { ordinal: Ordinal, weekday: Weekday },
    LastDayOfMonth,
}

/// Rule embedded in its owning item; never shared between items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub pattern: RecurrencePattern,
    /// Date of the most recent occurrence; anchors biweekly cadence.
    pub last_fired: Option<NaiveDate>,
    /// When false the rule is dormant and completion is terminal.
    pub is_template: bool,
}

impl RecurrenceRule {
    pub fn new(pattern: RecurrencePattern) -> Self {
        Self {
            pattern,
            last_fired: None,
            is_template: true,
        }
    }
}

/// Computes the date of the next occurrence after `from` (usually the
/// completion date).
pub fn next_occurrence(rule: &RecurrenceRule, from: NaiveDate) -> NaiveDate {
    match rule.pattern {
        RecurrencePattern::Daily => from + Duration::days(1),
        RecurrencePattern::Weekly { weekday } => {
            next_weekday_on_or_after(from + Duration::days(1), weekday)
        }
        RecurrencePattern::Biweekly { weekday } => {
            let anchor = rule.last_fired.unwrap_or(from);
            next_weekday_on_or_after(anchor + Duration::days(14), weekday)
        }
        RecurrencePattern::MonthlyByDate { day } => {
            let (year, month) = next_month(from.year(), from.month());
            clamped_date(year, month, u32::from(day))
        }
        RecurrencePattern::MonthlyByOrdinal { ordinal, weekday } => {
            let (year, month) = next_month(from.year(), from.month());
            ordinal_weekday(year, month, ordinal, weekday)
        }
        RecurrencePattern::LastDayOfMonth => {
            let (year, month) = next_month(from.year(), from.month());
            clamped_date(year, month, 31)
        }
    }
}

/// Spawns the successor for a completed recurring item.
///
/// Copies every field except `id`, `status`, `completed_at` and
/// `created_at`; the successor is active, due on `next_date`, and keeps
/// the same rule with `last_fired` advanced to `next_date`.
pub fn spawn_successor(completed: &CapturedItem, next_date: NaiveDate) -> CapturedItem {
    let now = crate::model::item::now_epoch_ms();
    let mut successor = completed.clone();
    successor.id = Uuid::new_v4();
    successor.status = ItemStatus::Active;
    successor.completed_at = None;
    successor.created_at = now;
    successor.updated_at = now;
    successor.set_schedule_date(Some(next_date));
    if let Some(rule) = successor.recurrence.as_mut() {
        rule.last_fired = Some(next_date);
    }
    successor
}

/// First date on or after `start` falling on `weekday`.
fn next_weekday_on_or_after(start: NaiveDate, weekday: Weekday) -> NaiveDate {
    let offset = (weekday.num_days_from_monday() + 7 - start.weekday().num_days_from_monday()) % 7;
    start + Duration::days(i64::from(offset))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = next_month(year, month);
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap_or(NaiveDate::MAX);
    (first_of_next - Duration::days(1)).day()
}

/// Builds a date, clamping `day` to the month length.
fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(year, month));
    // Clamped day is always valid for (year, month).
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MAX)
}

/// Nth (or last) `weekday` of the given month.
fn ordinal_weekday(year: i32, month: u32, ordinal: Ordinal, weekday: Weekday) -> NaiveDate {
    let first = clamped_date(year, month, 1);
    let first_match = next_weekday_on_or_after(first, weekday);
    let candidate = first_match + Duration::days(i64::from(ordinal.index()) * 7);
    if candidate.month() == month {
        candidate
    } else {
        // A fifth/last occurrence that overflows steps back one week.
        candidate - Duration::days(7)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        next_occurrence, next_weekday_on_or_after, Ordinal, RecurrencePattern, RecurrenceRule,
    };
    use chrono::{NaiveDate, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_advances_one_day() {
        let rule = RecurrenceRule::new(RecurrencePattern::Daily);
        assert_eq!(next_occurrence(&rule, date(2025, 1, 31)), date(2025, 2, 1));
    }

    #[test]
    fn weekly_monday_completed_on_wednesday_lands_next_monday() {
        let rule = RecurrenceRule::new(RecurrencePattern::Weekly {
            weekday: Weekday::Mon,
        });
        // 2025-06-04 is a Wednesday; the following Monday is 2025-06-09.
        assert_eq!(next_occurrence(&rule, date(2025, 6, 4)), date(2025, 6, 9));
    }

    #[test]
    fn weekly_never_returns_the_from_date() {
        let rule = RecurrenceRule::new(RecurrencePattern::Weekly {
            weekday: Weekday::Mon,
        });
        // Completing on a Monday schedules the Monday after, not today.
        assert_eq!(next_occurrence(&rule, date(2025, 6, 9)), date(2025, 6, 16));
    }

    #[test]
    fn biweekly_is_anchored_on_last_fired() {
        let mut rule = RecurrenceRule::new(RecurrencePattern::Biweekly {
            weekday: Weekday::Fri,
        });
        rule.last_fired = Some(date(2025, 6, 6)); // a Friday
                                                  // Completing late (June 10) must not drift the cadence.
        assert_eq!(next_occurrence(&rule, date(2025, 6, 10)), date(2025, 6, 20));
    }

    #[test]
    fn monthly_by_date_clamps_to_month_length() {
        let rule = RecurrenceRule::new(RecurrencePattern::MonthlyByDate { day: 31 });
        assert_eq!(next_occurrence(&rule, date(2025, 3, 31)), date(2025, 4, 30));
        assert_eq!(next_occurrence(&rule, date(2025, 1, 31)), date(2025, 2, 28));
    }

    #[test]
    fn monthly_by_ordinal_finds_first_monday() {
        let rule = RecurrenceRule::new(RecurrencePattern::MonthlyByOrdinal {
            ordinal: Ordinal::First,
            weekday: Weekday::Mon,
        });
        // First Monday of July 2025 is the 7th.
        assert_eq!(next_occurrence(&rule, date(2025, 6, 15)), date(2025, 7, 7));
    }

    #[test]
    fn monthly_by_ordinal_last_steps_back_when_month_is_short() {
        let rule = RecurrenceRule::new(RecurrencePattern::MonthlyByOrdinal {
            ordinal: Ordinal::Last,
            weekday: Weekday::Fri,
        });
        // Last Friday of February 2025 is the 28th.
        assert_eq!(next_occurrence(&rule, date(2025, 1, 15)), date(2025, 2, 28));
    }

    #[test]
    fn last_day_of_month_handles_leap_years() {
        let rule = RecurrenceRule::new(RecurrencePattern::LastDayOfMonth);
        assert_eq!(next_occurrence(&rule, date(2024, 1, 15)), date(2024, 2, 29));
        assert_eq!(next_occurrence(&rule, date(2025, 1, 15)), date(2025, 2, 28));
    }

    #[test]
    fn next_weekday_on_or_after_is_inclusive() {
        assert_eq!(
            next_weekday_on_or_after(date(2025, 6, 9), Weekday::Mon),
            date(2025, 6, 9)
        );
    }
}
