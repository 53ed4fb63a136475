use chrono::{NaiveDate, Weekday};
use lazybrain_core::db::open_db_in_memory;
use lazybrain_core::{
    CapturedItem, Category, CoreConfig, ItemRepository, ItemStatus, LifecycleEngine,
    RecurrencePattern, RecurrenceRule, SqliteItemRepository,
};
use rusqlite::Connection;

const USER: i64 = 1;

#[test]
fn completing_a_template_spawns_its_successor() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = LifecycleEngine::new(CoreConfig::default());

    let id = seed_recurring(
        &conn,
        "water the plants",
        RecurrencePattern::Weekly {
            weekday: Weekday::Mon,
        },
    );

    // 2025-06-04 is a Wednesday; the successor lands on Monday the 9th.
    let outcome = engine
        .complete_on(&mut conn, USER, id, date(2025, 6, 4))
        .unwrap();

    assert_eq!(outcome.item.status, ItemStatus::Completed);
    let successor = outcome.successor.expect("template must spawn a successor");
    assert_ne!(successor.id, id);
    assert_eq!(successor.status, ItemStatus::Active);
    assert_eq!(successor.due_date, Some(date(2025, 6, 9)));
    assert_eq!(successor.title, "water the plants");
    assert_eq!(
        successor.recurrence.unwrap().last_fired,
        Some(date(2025, 6, 9))
    );

    // Both rows exist: the completed one and the active successor.
    let repo = SqliteItemRepository::new(&conn);
    assert_eq!(repo.get_item(USER, id).unwrap().status, ItemStatus::Completed);
    assert_eq!(
        repo.get_item(USER, successor.id).unwrap().status,
        ItemStatus::Active
    );
}

#[test]
fn monthly_by_date_successor_clamps_short_months() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = LifecycleEngine::new(CoreConfig::default());

    let id = seed_recurring(
        &conn,
        "pay rent",
        RecurrencePattern::MonthlyByDate { day: 31 },
    );

    let outcome = engine
        .complete_on(&mut conn, USER, id, date(2025, 3, 31))
        .unwrap();
    let successor = outcome.successor.unwrap();
    assert_eq!(successor.due_date, Some(date(2025, 4, 30)));
}

#[test]
fn dormant_rule_does_not_spawn() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = LifecycleEngine::new(CoreConfig::default());

    let repo = SqliteItemRepository::new(&conn);
    let mut item = CapturedItem::new(USER, Category::Task, "one-off chore");
    let mut rule = RecurrenceRule::new(RecurrencePattern::Daily);
    rule.is_template = false;
    item.recurrence = Some(rule);
    repo.create_item(&item).unwrap();

    let outcome = engine
        .complete_on(&mut conn, USER, item.id, date(2025, 6, 4))
        .unwrap();
    assert!(outcome.successor.is_none());
    assert_eq!(item_count(&conn), 1);
}

#[test]
fn successor_chain_keeps_biweekly_cadence() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = LifecycleEngine::new(CoreConfig::default());

    let id = seed_recurring(
        &conn,
        "review budget",
        RecurrencePattern::Biweekly {
            weekday: Weekday::Fri,
        },
    );

    // First completion anchors the cadence on the computed Friday.
    let first = engine
        .complete_on(&mut conn, USER, id, date(2025, 6, 6))
        .unwrap();
    let first_successor = first.successor.unwrap();
    assert_eq!(first_successor.due_date, Some(date(2025, 6, 20)));

    // Completing the successor late must not drift off the Friday grid.
    let second = engine
        .complete_on(&mut conn, USER, first_successor.id, date(2025, 6, 24))
        .unwrap();
    let second_successor = second.successor.unwrap();
    assert_eq!(second_successor.due_date, Some(date(2025, 7, 4)));
}

fn seed_recurring(
    conn: &Connection,
    title: &str,
    pattern: RecurrencePattern,
) -> lazybrain_core::ItemId {
    let repo = SqliteItemRepository::new(conn);
    let mut item = CapturedItem::new(USER, Category::Task, title);
    item.recurrence = Some(RecurrenceRule::new(pattern));
    repo.create_item(&item).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn item_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))
        .unwrap()
}
