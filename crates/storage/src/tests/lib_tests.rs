use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("client.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn stores_overwrites_and_removes_items() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(storage.get_item("token").await.expect("get"), None);

    storage.set_item("token", "first").await.expect("set");
    storage.set_item("token", "second").await.expect("overwrite");
    assert_eq!(
        storage.get_item("token").await.expect("get").as_deref(),
        Some("second")
    );

    let item = storage
        .load_item("token")
        .await
        .expect("load")
        .expect("item present");
    assert_eq!(item.key, "token");
    assert!(item.updated_at <= Utc::now());

    storage.remove_item("token").await.expect("remove");
    assert_eq!(storage.get_item("token").await.expect("get"), None);
}

#[tokio::test]
async fn removing_missing_item_is_not_an_error() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.remove_item("absent").await.expect("remove");
}

#[tokio::test]
async fn items_survive_reopening_the_database() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("client.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    {
        let storage = Storage::new(&database_url).await.expect("db");
        storage.set_item("token", "persisted").await.expect("set");
        storage.pool().close().await;
    }

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.get_item("token").await.expect("get").as_deref(),
        Some("persisted")
    );
}

#[tokio::test]
async fn memory_store_round_trips_items() {
    let store = MemoryStore::new();
    store.set_item("token", "abc").await.expect("set");
    assert_eq!(store.get_item("token").await.expect("get").as_deref(), Some("abc"));
    store.remove_item("token").await.expect("remove");
    assert_eq!(store.get_item("token").await.expect("get"), None);
}

#[test]
fn memory_urls_have_no_sqlite_path() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(sqlite_path("sqlite://file:chat?mode=memory"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/client.db"),
        Some(PathBuf::from("./data/client.db"))
    );
}
