use super::*;
use time::OffsetDateTime;

fn row(title: &str, secs: i64) -> Bookmark {
    Bookmark {
        id: Uuid::new_v4(),
        title: title.to_owned(),
        url: format!("https://example.com/{title}"),
        user_id: Uuid::nil(),
        created_at: OffsetDateTime::from_unix_timestamp(secs).expect("valid timestamp"),
    }
}

fn delete_of(row: &Bookmark) -> ChangeEvent {
    ChangeEvent::Delete(RowKey { id: row.id, user_id: Some(row.user_id) })
}

// =============================================================================
// apply_change
// =============================================================================

#[test]
fn insert_insert_delete_leaves_second_row() {
    let a = row("a", 1);
    let b = row("b", 2);
    let mut items = Vec::new();

    apply_change(&mut items, ChangeEvent::Insert(a.clone()));
    apply_change(&mut items, ChangeEvent::Insert(b.clone()));
    apply_change(&mut items, delete_of(&a));

    assert_eq!(items, vec![b]);
}

#[test]
fn insert_prepends_without_resorting() {
    let newer = row("newer", 20);
    let late_older = row("older", 10);
    let mut items = vec![newer.clone()];

    apply_change(&mut items, ChangeEvent::Insert(late_older.clone()));

    assert_eq!(items, vec![late_older, newer]);
}

#[test]
fn insert_of_known_id_replaces_in_place() {
    let a = row("a", 1);
    let b = row("b", 2);
    let mut items = vec![b.clone(), a.clone()];
    let mut echoed = a.clone();
    echoed.title = "a2".into();

    apply_change(&mut items, ChangeEvent::Insert(echoed.clone()));

    assert_eq!(items, vec![b, echoed]);
}

#[test]
fn update_replaces_matching_row() {
    let a = row("a", 1);
    let mut items = vec![a.clone()];
    let mut renamed = a.clone();
    renamed.title = "renamed".into();

    apply_change(&mut items, ChangeEvent::Update(renamed.clone()));

    assert_eq!(items, vec![renamed]);
}

#[test]
fn update_of_unknown_id_is_noop() {
    let a = row("a", 1);
    let mut items = vec![a.clone()];

    apply_change(&mut items, ChangeEvent::Update(row("ghost", 5)));

    assert_eq!(items, vec![a]);
}

#[test]
fn delete_of_unknown_id_is_noop() {
    let a = row("a", 1);
    let mut items = vec![a.clone()];

    apply_change(&mut items, delete_of(&row("ghost", 5)));

    assert_eq!(items, vec![a]);
}

#[test]
fn update_after_delete_does_not_resurrect_row() {
    let a = row("a", 1);
    let mut items = vec![a.clone()];
    let mut renamed = a.clone();
    renamed.title = "late edit".into();

    apply_change(&mut items, delete_of(&a));
    apply_change(&mut items, ChangeEvent::Update(renamed));

    assert!(items.is_empty());
}

// =============================================================================
// decoding
// =============================================================================

const ROW: &str = r#"{"id":"6f1c2d0e-8d0a-4a53-9d8e-0b1b5c4b8f01","title":"Docs","url":"https://docs.rs","user_id":"2b0d3a4c-1e7f-4c8b-a4a1-99d1c1b2f6aa","created_at":"2024-05-01T10:00:00.5+00:00"}"#;

#[test]
fn parse_insert_payload() {
    let payload = format!(r#"{{"eventType":"INSERT","new":{ROW},"old":null}}"#);
    let event = ChangeEvent::parse(&payload).expect("insert should decode");
    assert_eq!(event.kind(), ChangeKind::Insert);
    assert_eq!(event.id().to_string(), "6f1c2d0e-8d0a-4a53-9d8e-0b1b5c4b8f01");
    assert_eq!(event.owner().map(|u| u.to_string()).as_deref(), Some("2b0d3a4c-1e7f-4c8b-a4a1-99d1c1b2f6aa"));
}

#[test]
fn parse_update_payload_uses_new_row() {
    let payload = format!(r#"{{"eventType":"UPDATE","new":{ROW},"old":{ROW}}}"#);
    let event = ChangeEvent::parse(&payload).expect("update should decode");
    assert!(matches!(event, ChangeEvent::Update(ref b) if b.title == "Docs"));
}

#[test]
fn parse_delete_payload_with_partial_old_row() {
    let payload = r#"{"eventType":"DELETE","new":{},"old":{"id":"6f1c2d0e-8d0a-4a53-9d8e-0b1b5c4b8f01"}}"#;
    let event = ChangeEvent::parse(payload).expect("delete should decode");
    assert_eq!(event.kind(), ChangeKind::Delete);
    assert_eq!(event.owner(), None);
}

#[test]
fn parse_delete_payload_with_full_old_row() {
    let payload = format!(r#"{{"eventType":"DELETE","new":null,"old":{ROW}}}"#);
    let event = ChangeEvent::parse(&payload).expect("delete should decode");
    assert!(event.owner().is_some());
}

#[test]
fn parse_insert_without_new_row_fails() {
    let err = ChangeEvent::parse(r#"{"eventType":"INSERT","new":null}"#).unwrap_err();
    assert!(matches!(err, ChangeError::MissingRow { kind: ChangeKind::Insert, field: "new" }));
}

#[test]
fn parse_malformed_row_fails() {
    let err = ChangeEvent::parse(r#"{"eventType":"UPDATE","new":{"id":"nope"}}"#).unwrap_err();
    assert!(matches!(err, ChangeError::Row { field: "new", .. }));
}

#[test]
fn parse_unknown_event_type_fails() {
    let err = ChangeEvent::parse(r#"{"eventType":"TRUNCATE"}"#).unwrap_err();
    assert!(matches!(err, ChangeError::Json(_)));
}

#[test]
fn serialized_event_uses_wire_field_names() {
    let event = ChangeEvent::Insert(row("a", 1));
    let value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(value["eventType"], "INSERT");
    assert_eq!(value["new"]["title"], "a");
    assert!(value["old"].is_null());
}

#[test]
fn stream_message_change_is_tagged() {
    let a = row("a", 1);
    let msg = StreamMessage::Change { event: delete_of(&a) };
    let value = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(value["type"], "change");
    assert_eq!(value["event"]["eventType"], "DELETE");
    assert_eq!(value["event"]["old"]["id"], a.id.to_string());

    let back: StreamMessage = serde_json::from_value(value).expect("deserialize");
    assert_eq!(back, msg);
}

#[test]
fn stream_message_subscribed_decodes() {
    let msg: StreamMessage =
        serde_json::from_str(r#"{"type":"subscribed","user_id":"2b0d3a4c-1e7f-4c8b-a4a1-99d1c1b2f6aa"}"#)
            .expect("decode");
    assert!(matches!(msg, StreamMessage::Subscribed { .. }));
}

// =============================================================================
// SubscriptionState
// =============================================================================

#[test]
fn subscription_state_defaults_to_unsubscribed() {
    assert_eq!(SubscriptionState::default(), SubscriptionState::Unsubscribed);
    assert!(!SubscriptionState::Unsubscribed.holds_transport());
    assert!(SubscriptionState::Subscribing.holds_transport());
    assert!(SubscriptionState::Subscribed.holds_transport());
    assert!(SubscriptionState::Error.holds_transport());
}

#[test]
fn subscription_state_display() {
    assert_eq!(SubscriptionState::Subscribing.to_string(), "subscribing");
    assert_eq!(ChangeKind::Delete.to_string(), "DELETE");
}
