use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use serde_json::json;

#[test]
fn test_insert_and_find_by_id() {
    let conn = crate::db::open_in_memory().unwrap();
    let repo = ActionLogRepository::new(&conn);

    let log = ActionLog::new(None, ActionType::Catalog, "user1")
        .with_payload(json!({ "entity": "cart", "serial": "LX-01" }))
        .with_detail("新增小车");
    let id = repo.insert(&log).unwrap();
    assert_eq!(id, log.action_id);

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.actor, "user1");
    assert_eq!(found.action_type, "Catalog");
    assert_eq!(found.payload_json.unwrap()["serial"], "LX-01");
    assert_eq!(found.detail.as_deref(), Some("新增小车"));
}

#[test]
fn test_find_by_id_missing_returns_none() {
    let conn = crate::db::open_in_memory().unwrap();
    let repo = ActionLogRepository::new(&conn);
    assert!(repo.find_by_id("nope").unwrap().is_none());
}

#[test]
fn test_find_by_mission_and_type() {
    let conn = crate::db::open_in_memory().unwrap();
    let repo = ActionLogRepository::new(&conn);

    repo.insert(&ActionLog::new(Some(7), ActionType::StateChange, "a")).unwrap();
    repo.insert(&ActionLog::new(Some(7), ActionType::AssignCarts, "a")).unwrap();
    repo.insert(&ActionLog::new(Some(8), ActionType::StateChange, "a")).unwrap();

    assert_eq!(repo.find_by_mission(7).unwrap().len(), 2);
    assert_eq!(repo.find_by_mission_and_type(7, "StateChange").unwrap().len(), 1);
    assert_eq!(repo.find_recent(10).unwrap().len(), 3);
}
