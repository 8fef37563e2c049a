//! Refresh token domain model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Device fingerprint a refresh token is scoped to.
///
/// Used purely as an equality key; neither field is parsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Device {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Device {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            user_agent: Some(user_agent.into()),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Opaque base64url string handed to the client.
    pub token: String,
    pub expiry_date: DateTime<Utc>,
    pub revoked: bool,
    pub device: Device,
    pub created_at: DateTime<Utc>,
    /// Id of the token that replaced this one on rotation. Only an id is
    /// kept; callers resolve it one level at a time.
    pub replaced_by: Option<Uuid>,
}

impl RefreshToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date < now
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("token", &"[redacted]")
            .field("expiry_date", &self.expiry_date)
            .field("revoked", &self.revoked)
            .field("device", &self.device)
            .field("created_at", &self.created_at)
            .field("replaced_by", &self.replaced_by)
            .finish()
    }
}
