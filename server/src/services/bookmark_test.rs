use super::*;
use crate::state::test_helpers::MemoryStore;
#[cfg(feature = "live-db-tests")]
use crate::state::test_helpers;

// =============================================================================
// insert_bookmark
// =============================================================================

#[tokio::test]
async fn insert_then_list_puts_new_row_first() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    insert_bookmark(&store, user, "Old", "https://old.example").await.unwrap();
    let created = insert_bookmark(&store, user, "  Rust  ", " https://www.rust-lang.org ").await.unwrap();

    let rows = list_bookmarks(&store, user).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], created);
    assert_eq!(rows[0].title, "Rust");
    assert_eq!(rows[0].url, "https://www.rust-lang.org");
    assert_eq!(rows[0].user_id, user);
    assert_eq!(rows.iter().filter(|b| b.id == created.id).count(), 1);
}

#[tokio::test]
async fn insert_blank_field_never_reaches_store() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();

    let err = insert_bookmark(&store, user, "   ", "https://x.example").await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(ValidationError::EmptyTitle)));
    let err = insert_bookmark(&store, user, "title", "").await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(ValidationError::EmptyUrl)));

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn insert_store_failure_is_database_error() {
    let store = MemoryStore::failing();
    let err = insert_bookmark(&store, Uuid::new_v4(), "t", "https://u").await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));
    assert_eq!(err.code(), "store");
}

// =============================================================================
// list_bookmarks
// =============================================================================

#[tokio::test]
async fn list_is_empty_for_new_user() {
    let store = MemoryStore::new();
    assert!(list_bookmarks(&store, Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_is_scoped_to_owner() {
    let store = MemoryStore::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    insert_bookmark(&store, alice, "a", "https://a").await.unwrap();
    insert_bookmark(&store, bob, "b", "https://b").await.unwrap();

    let rows = list_bookmarks(&store, alice).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "a");
}

// =============================================================================
// update_bookmark
// =============================================================================

#[tokio::test]
async fn update_changes_only_title() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    let before = insert_bookmark(&store, user, "before", "https://keep.example").await.unwrap();

    let outcome = update_bookmark(&store, user, before.id, "  after ").await.unwrap();
    let UpdateOutcome::Updated(after) = outcome else {
        panic!("expected Updated, got {outcome:?}");
    };
    assert_eq!(after.title, "after");
    assert_eq!(after.url, before.url);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.user_id, before.user_id);
}

#[tokio::test]
async fn update_with_blank_title_is_skipped() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    let row = insert_bookmark(&store, user, "keep", "https://k").await.unwrap();
    let calls = store.calls();

    for blank in ["", "   "] {
        assert_eq!(update_bookmark(&store, user, row.id, blank).await.unwrap(), UpdateOutcome::Skipped);
    }
    assert_eq!(store.calls(), calls);
    assert_eq!(list_bookmarks(&store, user).await.unwrap()[0].title, "keep");
}

#[tokio::test]
async fn update_of_other_users_row_is_not_found() {
    let store = MemoryStore::new();
    let row = insert_bookmark(&store, Uuid::new_v4(), "theirs", "https://t").await.unwrap();

    let err = update_bookmark(&store, Uuid::new_v4(), row.id, "mine").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == row.id));
    assert_eq!(err.code(), "not_found");
}

// =============================================================================
// delete_bookmark
// =============================================================================

#[tokio::test]
async fn delete_then_list_excludes_row() {
    let store = MemoryStore::new();
    let user = Uuid::new_v4();
    let a = insert_bookmark(&store, user, "a", "https://a").await.unwrap();
    let b = insert_bookmark(&store, user, "b", "https://b").await.unwrap();

    delete_bookmark(&store, user, a.id).await.unwrap();
    let rows = list_bookmarks(&store, user).await.unwrap();
    assert_eq!(rows, vec![b]);
}

#[tokio::test]
async fn delete_missing_row_is_not_found() {
    let store = MemoryStore::new();
    let err = delete_bookmark(&store, Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

// =============================================================================
// StoreError
// =============================================================================

#[test]
fn validation_codes_pass_through() {
    assert_eq!(StoreError::from(ValidationError::EmptyTitle).code(), "empty_title");
    assert_eq!(StoreError::from(ValidationError::EmptyUrl).code(), "empty_url");
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn pg_store_round_trip_respects_owner() {
    let pool = test_helpers::integration_pool().await;
    let alice = test_helpers::seed_user(&pool).await;
    let bob = test_helpers::seed_user(&pool).await;
    let store = PgBookmarkStore::new(pool);

    let first = insert_bookmark(&store, alice, "first", "https://1.example").await.expect("insert");
    let second = insert_bookmark(&store, alice, "second", "https://2.example").await.expect("insert");

    let rows = list_bookmarks(&store, alice).await.expect("list");
    assert_eq!(rows.iter().map(|b| b.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    assert!(list_bookmarks(&store, bob).await.expect("list").is_empty());

    // Bob cannot see, rename, or delete Alice's rows.
    assert!(matches!(update_bookmark(&store, bob, first.id, "x").await, Err(StoreError::NotFound(_))));
    assert!(matches!(delete_bookmark(&store, bob, first.id).await, Err(StoreError::NotFound(_))));

    let UpdateOutcome::Updated(renamed) = update_bookmark(&store, alice, first.id, "renamed").await.expect("update")
    else {
        panic!("expected Updated");
    };
    assert_eq!(renamed.url, first.url);

    delete_bookmark(&store, alice, first.id).await.expect("delete");
    let rows = list_bookmarks(&store, alice).await.expect("list");
    assert!(rows.iter().all(|b| b.id != first.id));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn long_urls_can_be_inserted_renamed_and_deleted() {
    let pool = test_helpers::integration_pool().await;
    let user = test_helpers::seed_user(&pool).await;
    let store = PgBookmarkStore::new(pool);

    // Each size used to overflow the change notification.
    for len in [4_500, 8_000] {
        let url = format!("https://long.example/{}", "a".repeat(len));
        let row = insert_bookmark(&store, user, "mid", &url).await.expect("insert");

        let UpdateOutcome::Updated(renamed) = update_bookmark(&store, user, row.id, "renamed").await.expect("update")
        else {
            panic!("expected Updated");
        };
        assert_eq!(renamed.title, "renamed");
        assert_eq!(renamed.url, url);
        assert_eq!(store.get(user, row.id).await.expect("get").map(|b| b.title), Some("renamed".to_owned()));

        delete_bookmark(&store, user, row.id).await.expect("delete");
    }
}

#[tokio::test]
async fn get_is_scoped_to_owner() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let row = crate::state::test_helpers::bookmark_for(owner, "mine");
    store.seed(row.clone());

    assert_eq!(store.get(owner, row.id).await.unwrap(), Some(row.clone()));
    assert_eq!(store.get(Uuid::new_v4(), row.id).await.unwrap(), None);
}
