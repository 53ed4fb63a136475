use lazybrain_core::db::open_db_in_memory;
use lazybrain_core::{
    undo_last, CapturedItem, Category, CoreConfig, ItemRepository, LifecycleEngine, Priority,
    SqliteItemRepository, UndoAction, UndoOutcome,
};
use rusqlite::Connection;

const USER: i64 = 1;
const OTHER: i64 = 2;

#[test]
fn undo_restores_a_priority_change() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, "buy milk");

    engine
        .set_priority(&mut conn, USER, id, Priority::Urgent)
        .unwrap();

    let outcome = undo_last(&mut conn, USER).unwrap();
    assert_eq!(
        outcome,
        UndoOutcome::Reverted {
            action: UndoAction::PriorityChange,
            title: "buy milk".to_string(),
        }
    );

    let repo = SqliteItemRepository::new(&conn);
    assert_eq!(repo.get_item(USER, id).unwrap().priority, Priority::Medium);
}

#[test]
fn undo_after_delete_reinserts_with_the_original_id() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();

    let repo = SqliteItemRepository::new(&conn);
    let mut item = CapturedItem::new(USER, Category::Task, "renew license");
    item.due_date = chrono::NaiveDate::from_ymd_opt(2026, 3, 15);
    item.next_action = Some("book DMV slot".to_string());
    repo.create_item(&item).unwrap();

    engine.delete(&mut conn, USER, item.id).unwrap();

    let outcome = undo_last(&mut conn, USER).unwrap();
    assert!(matches!(
        outcome,
        UndoOutcome::Reverted {
            action: UndoAction::Delete,
            ..
        }
    ));

    let repo = SqliteItemRepository::new(&conn);
    let restored = repo.get_item(USER, item.id).unwrap();
    assert_eq!(restored, item);
}

#[test]
fn undo_on_empty_log_reports_empty() {
    let mut conn = open_db_in_memory().unwrap();
    assert_eq!(undo_last(&mut conn, USER).unwrap(), UndoOutcome::Empty);
}

#[test]
fn log_keeps_only_the_newest_ten_entries() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, "buy milk");

    // 15 mutations; the capacity is 10.
    for round in 0..15 {
        let priority = if round % 2 == 0 {
            Priority::High
        } else {
            Priority::Low
        };
        engine.set_priority(&mut conn, USER, id, priority).unwrap();
    }

    assert_eq!(undo_rows(&conn, USER), 10);

    // Every remaining entry pops, oldest five are gone.
    for _ in 0..10 {
        assert!(matches!(
            undo_last(&mut conn, USER).unwrap(),
            UndoOutcome::Reverted { .. }
        ));
    }
    assert_eq!(undo_last(&mut conn, USER).unwrap(), UndoOutcome::Empty);
}

#[test]
fn undo_logs_are_per_user() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();

    let mine = seed(&conn, "my task");
    let repo = SqliteItemRepository::new(&conn);
    let theirs = CapturedItem::new(OTHER, Category::Task, "their task");
    repo.create_item(&theirs).unwrap();

    engine
        .set_priority(&mut conn, USER, mine, Priority::High)
        .unwrap();
    engine
        .set_priority(&mut conn, OTHER, theirs.id, Priority::Low)
        .unwrap();

    // My undo touches my item only.
    assert!(matches!(
        undo_last(&mut conn, USER).unwrap(),
        UndoOutcome::Reverted { title, .. } if title == "my task"
    ));
    assert_eq!(undo_rows(&conn, OTHER), 1);
}

#[test]
fn consecutive_undos_walk_backwards_through_history() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, "buy milk");

    engine
        .set_priority(&mut conn, USER, id, Priority::High)
        .unwrap();
    engine
        .set_priority(&mut conn, USER, id, Priority::Urgent)
        .unwrap();

    undo_last(&mut conn, USER).unwrap(); // back to High
    let repo = SqliteItemRepository::new(&conn);
    assert_eq!(repo.get_item(USER, id).unwrap().priority, Priority::High);

    undo_last(&mut conn, USER).unwrap(); // back to Medium
    let repo = SqliteItemRepository::new(&conn);
    assert_eq!(repo.get_item(USER, id).unwrap().priority, Priority::Medium);
}

fn engine() -> LifecycleEngine {
    LifecycleEngine::new(CoreConfig::default())
}

fn seed(conn: &Connection, title: &str) -> lazybrain_core::ItemId {
    let repo = SqliteItemRepository::new(conn);
    let item = CapturedItem::new(USER, Category::Task, title);
    repo.create_item(&item).unwrap()
}

fn undo_rows(conn: &Connection, user: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM undo_log WHERE user_id = ?1;",
        [user],
        |row| row.get(0),
    )
    .unwrap()
}
