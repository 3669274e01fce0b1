//! SQLite-backed credential store with OAuth refresh-token rotation.

use super::{CredentialError, CredentialStore, Credentials};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS credentials (
    user_id TEXT PRIMARY KEY,
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
";

pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
    http: Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
}

impl SqliteCredentialStore {
    pub fn new(
        db_path: &Path,
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Opened credential store at {:?}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
            http: Client::new(),
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    #[cfg(test)]
    fn in_memory(token_endpoint: &str) -> Self {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        Self {
            conn: Mutex::new(conn),
            http: Client::new(),
            token_endpoint: token_endpoint.to_string(),
            client_id: "client".into(),
            client_secret: "secret".into(),
        }
    }

    /// Store or overwrite a user's credentials (initial OAuth grant is done
    /// by outer plumbing; this is its entry point into the core).
    pub fn put(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO credentials (user_id, access_token, refresh_token, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at",
            params![
                credentials.user_id,
                credentials.access_token,
                credentials.refresh_token,
                credentials.expires_at.timestamp(),
            ],
        )
        .map_err(|e| CredentialError::Storage(e.to_string()))?;
        Ok(())
    }

    fn load(&self, user_id: &str) -> Result<Option<Credentials>, CredentialError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT access_token, refresh_token, expires_at FROM credentials WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(Credentials {
                    user_id: user_id.to_string(),
                    access_token: row.get(0)?,
                    refresh_token: row.get(1)?,
                    expires_at: timestamp_to_datetime(row.get(2)?),
                })
            },
        )
        .optional()
        .map_err(|e| CredentialError::Storage(e.to_string()))
    }
}

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, user_id: &str) -> Result<Credentials, CredentialError> {
        self.load(user_id)?
            .ok_or_else(|| CredentialError::Missing(user_id.to_string()))
    }

    async fn refresh(&self, user_id: &str) -> Result<Credentials, CredentialError> {
        let current = self.get(user_id).await?;

        debug!(%user_id, "Refreshing catalog access token");
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .timeout(REFRESH_TIMEOUT)
            .send()
            .await
            .map_err(|e| CredentialError::Refresh(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Refresh(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Refresh(format!("bad token response: {}", e)))?;

        let refreshed = Credentials {
            user_id: user_id.to_string(),
            access_token: token.access_token,
            // Providers may or may not rotate the refresh token.
            refresh_token: token.refresh_token.unwrap_or(current.refresh_token),
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in.unwrap_or(3600)),
        };
        self.put(&refreshed)?;
        Ok(refreshed)
    }
}
