//! Integration tests for the local note store: CRUD, ordering, metadata,
//! and the degraded in-memory fallback.

use chrono::{TimeZone, Utc};
use tabula_core::{BodyNode, Error, Note};
use tabula_db::Database;

async fn test_db() -> Database {
    Database::connect_in_memory()
        .await
        .expect("in-memory store should open")
}

fn note_at(id: &str, title: &str, updated_ms: i64) -> Note {
    Note {
        id: id.to_string(),
        title: title.to_string(),
        body: vec![BodyNode::text(title)],
        created_at: Utc.timestamp_millis_opt(updated_ms - 1000).unwrap(),
        updated_at: Utc.timestamp_millis_opt(updated_ms).unwrap(),
    }
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let db = test_db().await;
    let note = note_at("a", "First note", 5_000);
    db.notes.put(&note).await.unwrap();

    let fetched = db.notes.get("a").await.unwrap();
    assert_eq!(fetched, note);
}

#[tokio::test]
async fn get_missing_note_is_not_found() {
    let db = test_db().await;
    let err = db.notes.get("absent").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn put_is_an_upsert() {
    let db = test_db().await;
    db.notes.put(&note_at("a", "Old title", 1_000)).await.unwrap();

    let mut updated = note_at("a", "New title", 2_000);
    updated.body = vec![BodyNode::text("rewritten")];
    db.notes.put(&updated).await.unwrap();

    assert_eq!(db.notes.count().await.unwrap(), 1);
    let fetched = db.notes.get("a").await.unwrap();
    assert_eq!(fetched.title, "New title");
    assert_eq!(fetched.updated_at, updated.updated_at);
}

#[tokio::test]
async fn list_all_orders_by_updated_at_descending() {
    let db = test_db().await;
    db.notes.put(&note_at("old", "old", 1_000)).await.unwrap();
    db.notes.put(&note_at("new", "new", 9_000)).await.unwrap();
    db.notes.put(&note_at("mid", "mid", 5_000)).await.unwrap();

    let ids: Vec<String> = db
        .notes
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let db = test_db().await;
    db.notes.put(&note_at("a", "a", 1_000)).await.unwrap();

    db.notes.delete("a").await.unwrap();
    db.notes.delete("a").await.unwrap();
    db.notes.delete("never-existed").await.unwrap();
    assert_eq!(db.notes.count().await.unwrap(), 0);
}

#[tokio::test]
async fn metadata_set_and_get() {
    let db = test_db().await;
    assert_eq!(db.metadata.get("tabula-last-full-sync").await.unwrap(), None);

    db.metadata.set("tabula-last-full-sync", "1700000000000").await.unwrap();
    db.metadata.set("tabula-last-full-sync", "1700000005000").await.unwrap();

    assert_eq!(
        db.metadata.get("tabula-last-full-sync").await.unwrap(),
        Some("1700000005000".to_string())
    );
}

#[tokio::test]
async fn on_disk_store_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tabula.db");

    {
        let db = Database::connect(&path).await.unwrap();
        db.notes.put(&note_at("a", "persisted", 1_000)).await.unwrap();
    }

    let db = Database::connect(&path).await.unwrap();
    assert_eq!(db.notes.get("a").await.unwrap().title, "persisted");
}

#[tokio::test]
async fn unopenable_store_degrades_to_memory() {
    // A regular file in the parent position makes directory creation fail.
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let path = blocker.path().join("sub").join("tabula.db");

    let err = Database::connect(&path).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)));

    let db = Database::connect_or_memory(&path).await.unwrap();
    db.notes.put(&note_at("a", "in memory", 1_000)).await.unwrap();
    assert_eq!(db.notes.get("a").await.unwrap().title, "in memory");
}
