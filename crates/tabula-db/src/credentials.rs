//! Bearer credential persistence.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hex;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use tabula_core::defaults::TOKEN_EXPIRY_BUFFER_SECS;
use tabula_core::{Credential, CredentialStore, Error, Result, TokenResponse};

use crate::{from_ms, to_ms};

/// SQLite implementation of [`CredentialStore`].
///
/// One row, refreshed in place on renewal. Reads and writes are single
/// statements, so the store stays atomic without touching the sync locks.
#[derive(Clone, Debug)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Create a new SqliteCredentialStore with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hash a token using SHA256. The derived value stands in for the user
    /// identity; the raw identity is never stored.
    fn hash_subject(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn save(&self, token: TokenResponse) -> Result<Credential> {
        let expires_at =
            Utc::now() + Duration::seconds(token.expires_in - TOKEN_EXPIRY_BUFFER_SECS);
        let credential = Credential {
            subject_hash: Self::hash_subject(&token.access_token),
            access_token: token.access_token,
            scope: token.scope,
            token_type: token.token_type,
            expires_at,
        };

        sqlx::query(
            r#"INSERT INTO credential (id, access_token, scope, token_type, expires_at_ms, subject_hash)
               VALUES (1, ?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(id) DO UPDATE SET
                   access_token = excluded.access_token,
                   scope = excluded.scope,
                   token_type = excluded.token_type,
                   expires_at_ms = excluded.expires_at_ms,
                   subject_hash = excluded.subject_hash"#,
        )
        .bind(&credential.access_token)
        .bind(&credential.scope)
        .bind(&credential.token_type)
        .bind(to_ms(credential.expires_at))
        .bind(&credential.subject_hash)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(credential)
    }

    async fn get_valid(&self) -> Result<Option<Credential>> {
        let row = sqlx::query(
            "SELECT access_token, scope, token_type, expires_at_ms, subject_hash
             FROM credential WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let credential = Credential {
            access_token: row.get("access_token"),
            scope: row.get("scope"),
            token_type: row.get("token_type"),
            expires_at: from_ms(row.get("expires_at_ms"))?,
            subject_hash: row.get("subject_hash"),
        };

        if credential.is_expired(Utc::now()) {
            debug!(
                subsystem = "credentials",
                op = "get_valid",
                "Stored credential past buffered expiry, clearing"
            );
            self.clear().await?;
            return Ok(None);
        }

        Ok(Some(credential))
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM credential WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
