//! Catalog credential storage and refresh.
//!
//! Tokens are the only resource touched by more than one pipeline stage.
//! Under the sequential-tick invariant each playlist run reads then writes
//! its owner's record without interleaving; the store keeps its own
//! connection mutex so that invariant is not load-bearing for safety.

mod store;

pub use store::SqliteCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Catalog API credentials for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    /// The user has no stored credentials at all. Fatal to on-demand
    /// synthesis for that user.
    #[error("No credentials stored for user {0}")]
    Missing(String),

    /// The token refresh call failed. Retried by the scheduler.
    #[error("Credential refresh failed: {0}")]
    Refresh(String),

    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl CredentialError {
    /// Refresh failures are worth retrying; a missing record is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CredentialError::Refresh(_) | CredentialError::Storage(_))
    }
}

/// Trait for credential storage backends.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the stored credentials for a user.
    async fn get(&self, user_id: &str) -> Result<Credentials, CredentialError>;

    /// Refresh the user's access token and persist the rotated record.
    async fn refresh(&self, user_id: &str) -> Result<Credentials, CredentialError>;
}
