//! Room links across id generation, location parsing and history

use chatreal_core::*;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_generated_id_round_trips_through_share_link() {
    let room_id = generate_room_id();
    assert!(is_valid_room_id(&room_id));

    let page = assert_ok!(Location::parse("https://chat.example/app/?theme=dark"));
    let link = share_room_url(page.origin(), page.pathname(), &room_id);
    let opened = assert_ok!(Location::parse(&link));
    assert_eq!(opened.room_id(), Some(room_id));
}

#[test]
fn test_history_push_keeps_origin() {
    let mut history = History::new(assert_ok!(Location::parse("http://localhost:5173/")));
    let path = history.current().room_path("1699999999999-ab12cd3");
    history.push_state(&path);

    assert_eq!(
        history.current().to_string(),
        "http://localhost:5173/?room=1699999999999-ab12cd3"
    );
    assert_eq!(history.len(), 2);
}

#[test]
fn test_invalid_urls_are_rejected() {
    for url in ["", "localhost:5173", "://host/", "http:///path"] {
        let error = assert_err!(Location::parse(url));
        assert_eq!(error.error_code(), "INVALID_URL");
    }
}

#[test]
fn test_activity_flag_in_store() {
    let store = MemoryStore::shared();
    let key = room_activity_key("1699999999999-ab12cd3");
    assert_eq!(key, "room_1699999999999-ab12cd3_active");

    assert_ok!(store.set(&key, "true"));
    assert!(store.contains(&key));
    assert_ok!(store.remove(&key));
    assert_ok!(store.remove(&key));
    assert!(!store.contains(&key));
}
