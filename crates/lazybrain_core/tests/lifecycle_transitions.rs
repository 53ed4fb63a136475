use lazybrain_core::db::open_db_in_memory;
use lazybrain_core::{
    CapturedItem, Category, CoreConfig, ItemRepository, ItemStatus, LifecycleEngine,
    LifecycleError, Priority, SqliteItemRepository,
};
use rusqlite::Connection;

const USER: i64 = 1;

#[test]
fn complete_sets_status_and_timestamp() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, Category::Task, "buy milk");

    let outcome = engine.complete(&mut conn, USER, id).unwrap();
    assert_eq!(outcome.item.status, ItemStatus::Completed);
    assert!(outcome.item.completed_at.is_some());
    assert!(outcome.successor.is_none());

    let stored = SqliteItemRepository::new(&conn).get_item(USER, id).unwrap();
    assert_eq!(stored.status, ItemStatus::Completed);
}

#[test]
fn completing_twice_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, Category::Task, "buy milk");

    engine.complete(&mut conn, USER, id).unwrap();
    let err = engine.complete(&mut conn, USER, id).unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidTransition {
            from: ItemStatus::Completed,
            to: ItemStatus::Completed,
        }
    ));
}

#[test]
fn pause_is_projects_only() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();

    let project = seed(&conn, Category::Project, "patio build");
    let outcome = engine
        .set_status(&mut conn, USER, project, ItemStatus::Paused)
        .unwrap();
    assert_eq!(outcome.item.status, ItemStatus::Paused);

    let task = seed(&conn, Category::Task, "buy milk");
    let err = engine
        .set_status(&mut conn, USER, task, ItemStatus::Paused)
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
}

#[test]
fn someday_items_can_only_be_reactivated() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, Category::Idea, "solar shed");

    engine
        .set_status(&mut conn, USER, id, ItemStatus::Someday)
        .unwrap();

    // Someday -> Completed must pass through Active first.
    let err = engine.complete(&mut conn, USER, id).unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

    engine
        .set_status(&mut conn, USER, id, ItemStatus::Active)
        .unwrap();
    engine.complete(&mut conn, USER, id).unwrap();
}

#[test]
fn failed_transition_writes_no_undo_entry() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, Category::Task, "buy milk");

    let _ = engine
        .set_status(&mut conn, USER, id, ItemStatus::Paused)
        .unwrap_err();
    assert_eq!(undo_count(&conn), 0);

    engine
        .set_status(&mut conn, USER, id, ItemStatus::Someday)
        .unwrap();
    assert_eq!(undo_count(&conn), 1);
}

#[test]
fn set_priority_and_schedule_date() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, Category::Task, "renew license");

    let item = engine
        .set_priority(&mut conn, USER, id, Priority::Urgent)
        .unwrap();
    assert_eq!(item.priority, Priority::Urgent);

    let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
    let item = engine
        .set_schedule_date(&mut conn, USER, id, Some(date))
        .unwrap();
    assert_eq!(item.due_date, Some(date));
}

#[test]
fn schedule_date_on_contact_lands_on_follow_up() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, Category::Contact, "Rachel");

    let date = chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
    let item = engine
        .set_schedule_date(&mut conn, USER, id, Some(date))
        .unwrap();
    assert_eq!(item.follow_up_date, Some(date));
    assert_eq!(item.due_date, None);
}

#[test]
fn schedule_date_on_idea_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, Category::Idea, "solar shed");

    let date = chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
    let err = engine
        .set_schedule_date(&mut conn, USER, id, Some(date))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::IllegalForCategory { .. }));
}

#[test]
fn move_drops_fields_the_target_bucket_cannot_carry() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();

    let repo = SqliteItemRepository::new(&conn);
    let mut task = CapturedItem::new(USER, Category::Task, "sketch the shed");
    task.due_date = chrono::NaiveDate::from_ymd_opt(2026, 5, 1);
    task.next_action = Some("find paper".to_string());
    repo.create_item(&task).unwrap();

    let moved = engine
        .move_item(&mut conn, USER, task.id, Category::Idea)
        .unwrap();
    assert_eq!(moved.category, Category::Idea);
    assert_eq!(moved.due_date, None);
    assert_eq!(moved.next_action, None);
    moved.validate().unwrap();
}

#[test]
fn moving_a_paused_project_out_reactivates_it() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, Category::Project, "patio build");

    engine
        .set_status(&mut conn, USER, id, ItemStatus::Paused)
        .unwrap();
    let moved = engine
        .move_item(&mut conn, USER, id, Category::Task)
        .unwrap();
    assert_eq!(moved.status, ItemStatus::Active);
}

#[test]
fn delete_removes_the_row() {
    let mut conn = open_db_in_memory().unwrap();
    let engine = engine();
    let id = seed(&conn, Category::Task, "buy milk");

    let deleted = engine.delete(&mut conn, USER, id).unwrap();
    assert_eq!(deleted.title, "buy milk");

    let repo = SqliteItemRepository::new(&conn);
    assert!(repo.get_item(USER, id).is_err());
}

fn engine() -> LifecycleEngine {
    LifecycleEngine::new(CoreConfig::default())
}

fn seed(conn: &Connection, category: Category, title: &str) -> lazybrain_core::ItemId {
    let repo = SqliteItemRepository::new(conn);
    let item = CapturedItem::new(USER, category, title);
    repo.create_item(&item).unwrap()
}

fn undo_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM undo_log;", [], |row| row.get(0))
        .unwrap()
}
