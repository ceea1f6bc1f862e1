use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = ActionLog::now(
        "t1",
        Some("b1"),
        ActionType::CreateBatch,
        "registrar",
        Some(json!({"total_students": 3})),
        "创建批次",
    );
    let id = repo.insert(&log).unwrap();
    assert_eq!(id, log.action_id);

    let found = repo.find_by_id("t1", &id).unwrap().unwrap();
    assert_eq!(found.action_type, ActionType::CreateBatch);
    assert_eq!(found.batch_id.as_deref(), Some("b1"));
    assert_eq!(found.payload_json.unwrap()["total_students"], 3);

    // 其他租户不可见
    assert!(repo.find_by_id("t2", &id).unwrap().is_none());
}

#[test]
fn test_find_by_batch_filters_batch() {
    let repo = ActionLogRepository::new(setup_test_db());

    for (batch, kind) in [
        (Some("b1"), ActionType::CreateBatch),
        (Some("b1"), ActionType::AutoDecide),
        (Some("b2"), ActionType::CreateBatch),
        (None, ActionType::UpsertRule),
    ] {
        repo.insert(&ActionLog::now("t1", batch, kind, "registrar", None, "x"))
            .unwrap();
    }

    let logs = repo.find_by_batch("t1", "b1").unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.batch_id.as_deref() == Some("b1")));

    let recent = repo.find_recent("t1", 10).unwrap();
    assert_eq!(recent.len(), 4);
}
