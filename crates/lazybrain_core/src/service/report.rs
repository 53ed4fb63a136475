//! Scheduled report queries.
//!
//! # Responsibility
//! - Assemble the morning digest, evening review and weekly summary.
//!
//! # Invariants
//! - Reports are read-only; generating one never mutates items.
//! - All day arithmetic happens on calendar dates supplied by the
//!   caller, so scheduler and tests share one code path.

use crate::model::item::{Category, ItemId, ItemStatus, Priority, UserId};
use crate::repo::audit_repo;
use crate::repo::item_repo::{
    ItemListQuery, ItemRepository, ListOrder, RepoResult, SqliteItemRepository,
};
use chrono::{Duration, NaiveDate};
use log::info;
use rusqlite::Connection;

/// Which scheduled report to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Morning,
    Evening,
    Weekly,
}

/// One line of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSummary {
    pub id: ItemId,
    pub category: Category,
    pub title: String,
    /// Next action, follow-up reason or notes, whichever the bucket
    /// carries.
    pub detail: Option<String>,
    pub date: Option<NaiveDate>,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorningReport {
    pub active_projects: Vec<ItemSummary>,
    pub follow_ups_due: Vec<ItemSummary>,
    pub pending_tasks: Vec<ItemSummary>,
    /// One random active idea to keep the list alive.
    pub idea_spark: Option<ItemSummary>,
    pub needs_review: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EveningReport {
    pub completed_today: Vec<ItemSummary>,
    /// Due tomorrow, or high/urgent priority regardless of date.
    pub tomorrow_priorities: Vec<ItemSummary>,
    pub overdue: Vec<ItemSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    /// Open item count per bucket.
    pub bucket_counts: Vec<(Category, u32)>,
    pub completed_this_week: Vec<ItemSummary>,
    pub overdue: Vec<ItemSummary>,
    pub needs_review: u32,
}

/// A generated report, ready for a transport to render.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportData {
    Morning(MorningReport),
    Evening(EveningReport),
    Weekly(WeeklyReport),
}

/// Builds the requested report for `today`.
pub fn generate_report(
    conn: &Connection,
    user_id: UserId,
    kind: ReportKind,
    today: NaiveDate,
) -> RepoResult<ReportData> {
    let report = match kind {
        ReportKind::Morning => ReportData::Morning(morning(conn, user_id, today)?),
        ReportKind::Evening => ReportData::Evening(evening(conn, user_id, today)?),
        ReportKind::Weekly => ReportData::Weekly(weekly(conn, user_id, today)?),
    };
    info!("event=report_generated module=report kind={kind:?} user_id={user_id}");
    Ok(report)
}

fn morning(conn: &Connection, user_id: UserId, today: NaiveDate) -> RepoResult<MorningReport> {
    let repo = SqliteItemRepository::new(conn);

    let active_projects = repo.list_items(
        user_id,
        &ItemListQuery {
            category: Some(Category::Project),
            statuses: vec![ItemStatus::Active],
            order: ListOrder::ScheduleDate,
            ..ItemListQuery::default()
        },
    )?;

    let follow_ups_due = repo.list_items(
        user_id,
        &ItemListQuery {
            category: Some(Category::Contact),
            statuses: vec![ItemStatus::Active],
            scheduled_on_or_before: Some(today),
            order: ListOrder::ScheduleDate,
            ..ItemListQuery::default()
        },
    )?;

    let pending_tasks = repo.list_items(
        user_id,
        &ItemListQuery {
            category: Some(Category::Task),
            statuses: vec![ItemStatus::Active],
            order: ListOrder::ScheduleDate,
            ..ItemListQuery::default()
        },
    )?;

    let idea_spark = repo.random_idea(user_id)?.map(|item| summarize(&item));
    let needs_review = audit_repo::needs_review_count(conn, user_id)?;

    Ok(MorningReport {
        active_projects: active_projects.iter().map(summarize).collect(),
        follow_ups_due: follow_ups_due.iter().map(summarize).collect(),
        pending_tasks: pending_tasks.iter().map(summarize).collect(),
        idea_spark,
        needs_review,
    })
}

fn evening(conn: &Connection, user_id: UserId, today: NaiveDate) -> RepoResult<EveningReport> {
    let repo = SqliteItemRepository::new(conn);
    let tomorrow = today + Duration::days(1);
    let yesterday = today - Duration::days(1);

    let completed_today = repo.list_items(
        user_id,
        &ItemListQuery {
            statuses: vec![ItemStatus::Completed],
            completed_since_ms: Some(start_of_day_ms(today)),
            ..ItemListQuery::default()
        },
    )?;

    let due_tomorrow = repo.list_items(
        user_id,
        &ItemListQuery {
            statuses: vec![ItemStatus::Active],
            scheduled_on: Some(tomorrow),
            ..ItemListQuery::default()
        },
    )?;
    let high_priority = repo.list_items(
        user_id,
        &ItemListQuery {
            statuses: vec![ItemStatus::Active],
            min_priority: Some(Priority::High),
            ..ItemListQuery::default()
        },
    )?;
    let mut tomorrow_priorities: Vec<ItemSummary> =
        due_tomorrow.iter().map(summarize).collect();
    for item in &high_priority {
        if !tomorrow_priorities.iter().any(|s| s.id == item.id) {
            tomorrow_priorities.push(summarize(item));
        }
    }

    let overdue = overdue_items(&repo, user_id, yesterday)?;

    Ok(EveningReport {
        completed_today: completed_today.iter().map(summarize).collect(),
        tomorrow_priorities,
        overdue,
    })
}

fn weekly(conn: &Connection, user_id: UserId, today: NaiveDate) -> RepoResult<WeeklyReport> {
    let repo = SqliteItemRepository::new(conn);
    let week_start = today - Duration::days(6);
    let yesterday = today - Duration::days(1);

    let mut bucket_counts = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        bucket_counts.push((category, repo.open_count(user_id, category)?));
    }

    let completed_this_week = repo.list_items(
        user_id,
        &ItemListQuery {
            statuses: vec![ItemStatus::Completed],
            completed_since_ms: Some(start_of_day_ms(week_start)),
            ..ItemListQuery::default()
        },
    )?;

    let overdue = overdue_items(&repo, user_id, yesterday)?;
    let needs_review = audit_repo::needs_review_count(conn, user_id)?;

    Ok(WeeklyReport {
        bucket_counts,
        completed_this_week: completed_this_week.iter().map(summarize).collect(),
        overdue,
        needs_review,
    })
}

fn overdue_items(
    repo: &SqliteItemRepository<'_>,
    user_id: UserId,
    latest: NaiveDate,
) -> RepoResult<Vec<ItemSummary>> {
    let items = repo.list_items(
        user_id,
        &ItemListQuery {
            statuses: vec![ItemStatus::Active],
            scheduled_on_or_before: Some(latest),
            order: ListOrder::ScheduleDate,
            ..ItemListQuery::default()
        },
    )?;
    Ok(items.iter().map(summarize).collect())
}

fn summarize(item: &crate::model::item::CapturedItem) -> ItemSummary {
    let detail = item
        .next_action
        .clone()
        .or_else(|| item.follow_up_reason.clone())
        .or_else(|| item.notes.clone());
    ItemSummary {
        id: item.id,
        category: item.category,
        title: item.title.clone(),
        detail,
        date: item.schedule_date(),
        priority: item.priority,
    }
}

fn start_of_day_ms(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}
