//! Encrypted credential storage using SQLite.
//!
//! Persists one brokerage credential record per user. Field values are
//! ciphertext produced by [`TokenCipher`](super::encryption::TokenCipher);
//! the store itself never sees plaintext.

use super::CredentialRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE user_api_keys (
///     id INTEGER PRIMARY KEY,
///     user_id INTEGER NOT NULL UNIQUE,
///     api_key TEXT NOT NULL,        -- Ciphertext
///     access_token TEXT,            -- Ciphertext (NULL = not connected)
///     refresh_token TEXT,           -- Ciphertext (optional)
///     expires_at TEXT,              -- ISO 8601 timestamp (optional)
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```
///
/// # Concurrency
/// Last-writer-wins; reconnect is a rare, user-initiated action, so no
/// optimistic locking. The connection is wrapped in a Mutex and SQLite
/// provides transactional writes.
pub struct CredentialStore {
    conn: Mutex<Connection>,
}

impl CredentialStore {
    /// Creates or opens a credential store at the given path.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS user_api_keys (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL UNIQUE,
                api_key TEXT NOT NULL,
                access_token TEXT,
                refresh_token TEXT,
                expires_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create user_api_keys table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Stores the credential record for a user.
    ///
    /// If a record already exists for `user_id`, its fields are
    /// overwritten in place; a user never accumulates more than one
    /// record. All credential arguments must already be ciphertext.
    pub fn upsert(
        &self,
        user_id: i64,
        api_key_cipher: &str,
        access_token_cipher: Option<&str>,
        refresh_token_cipher: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let expires_at = expires_at.map(|dt| dt.to_rfc3339());
        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO user_api_keys (
                    user_id, api_key, access_token, refresh_token,
                    expires_at, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(user_id) DO UPDATE SET
                    api_key = excluded.api_key,
                    access_token = excluded.access_token,
                    refresh_token = excluded.refresh_token,
                    expires_at = excluded.expires_at,
                    updated_at = excluded.updated_at
                "#,
                params![
                    user_id,
                    api_key_cipher,
                    access_token_cipher,
                    refresh_token_cipher,
                    expires_at,
                    now,
                    now,
                ],
            )
            .context("Failed to store credentials")?;

        Ok(())
    }

    /// Retrieves the credential record for a user, ciphertext as stored.
    pub fn get(&self, user_id: i64) -> Result<Option<CredentialRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT api_key, access_token, refresh_token, expires_at, created_at
                FROM user_api_keys
                WHERE user_id = ?1
                "#,
            )
            .context("Failed to prepare query")?;

        let record = stmt
            .query_row(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()
            .context("Failed to read credential row")?;

        let Some((api_key, access_token, refresh_token, expires_at, created_at)) = record else {
            return Ok(None);
        };

        let expires_at = expires_at
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .context("Failed to parse expires_at timestamp")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .context("Failed to parse created_at timestamp")?;

        Ok(Some(CredentialRecord {
            user_id,
            api_key,
            access_token,
            refresh_token,
            expires_at,
            created_at,
        }))
    }

    /// Deletes the credential record for a user (account deletion cascade).
    ///
    /// Returns `true` if a record was removed.
    pub fn delete(&self, user_id: i64) -> Result<bool> {
        let rows_affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM user_api_keys WHERE user_id = ?1",
                params![user_id],
            )
            .context("Failed to delete credentials")?;

        Ok(rows_affected > 0)
    }
}
