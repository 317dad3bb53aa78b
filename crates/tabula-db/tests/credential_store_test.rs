//! Integration tests for bearer credential persistence and expiry.

use chrono::Utc;
use tabula_core::defaults::TOKEN_EXPIRY_BUFFER_SECS;
use tabula_core::{CredentialStore, TokenResponse};
use tabula_db::Database;

async fn test_db() -> Database {
    Database::connect_in_memory()
        .await
        .expect("in-memory store should open")
}

fn token(access_token: &str, expires_in: i64) -> TokenResponse {
    TokenResponse {
        access_token: access_token.to_string(),
        expires_in,
        scope: "drive.file".to_string(),
        token_type: "Bearer".to_string(),
    }
}

#[tokio::test]
async fn save_then_get_valid_returns_token() {
    let db = test_db().await;
    let saved = db.credentials.save(token("tok-1", 3_600)).await.unwrap();

    let fetched = db.credentials.get_valid().await.unwrap().unwrap();
    assert_eq!(fetched, saved);
    assert_eq!(fetched.access_token, "tok-1");
    assert_eq!(fetched.subject_hash.len(), 64);
    assert_ne!(fetched.subject_hash, "tok-1");
}

#[tokio::test]
async fn expiry_includes_buffer() {
    let db = test_db().await;
    let saved = db.credentials.save(token("tok-1", 3_600)).await.unwrap();

    let expected = Utc::now() + chrono::Duration::seconds(3_600 - TOKEN_EXPIRY_BUFFER_SECS);
    let drift = (saved.expires_at - expected).num_seconds().abs();
    assert!(drift < 5, "expiry should be lifetime minus buffer, drift {drift}s");
}

#[tokio::test]
async fn token_inside_buffer_window_reads_as_expired() {
    let db = test_db().await;
    // Lifetime shorter than the buffer: already past the buffered expiry.
    db.credentials
        .save(token("tok-1", TOKEN_EXPIRY_BUFFER_SECS - 10))
        .await
        .unwrap();

    assert!(db.credentials.get_valid().await.unwrap().is_none());
    // Expired read also cleared the row.
    assert!(db.credentials.get_valid().await.unwrap().is_none());
}

#[tokio::test]
async fn save_refreshes_in_place() {
    let db = test_db().await;
    db.credentials.save(token("tok-old", 3_600)).await.unwrap();
    db.credentials.save(token("tok-new", 7_200)).await.unwrap();

    let fetched = db.credentials.get_valid().await.unwrap().unwrap();
    assert_eq!(fetched.access_token, "tok-new");
}

#[tokio::test]
async fn clear_is_idempotent() {
    let db = test_db().await;
    db.credentials.save(token("tok-1", 3_600)).await.unwrap();

    db.credentials.clear().await.unwrap();
    db.credentials.clear().await.unwrap();
    assert!(db.credentials.get_valid().await.unwrap().is_none());
}
