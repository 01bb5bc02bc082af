use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity claims extracted from a cluster-issued access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_guid: String,
    pub user_name: Option<String>,
    pub scopes: Vec<String>,
    /// `exp` claim, Unix seconds.
    pub token_expiry: i64,
}

/// Per-(cluster, user) OAuth credentials in their decrypted, in-memory form.
///
/// The persisted form only ever holds the sealed tokens.
#[derive(Clone)]
pub struct TokenRecord {
    pub cnsi_guid: Uuid,
    pub user_guid: String,
    pub auth_token: String,
    pub refresh_token: String,
    pub token_expiry: DateTime<Utc>,
    pub identity: UserIdentity,
}

impl TokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry <= now
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("cnsi_guid", &self.cnsi_guid)
            .field("user_guid", &self.user_guid)
            .field("auth_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_expiry", &self.token_expiry)
            .field("identity", &self.identity)
            .finish()
    }
}
