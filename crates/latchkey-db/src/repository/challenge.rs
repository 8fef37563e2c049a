//! SurrealDB implementation of [`ChallengeCache`].
//!
//! One `otp_challenge` record per email, keyed by the email itself.
//! Expiry is stored as an absolute timestamp and every read filters on
//! it, so an expired entry is invisible even before it is purged.

use std::time::Duration;

use chrono::Utc;
use latchkey_core::error::LatchkeyResult;
use latchkey_core::repository::ChallengeCache;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CodeRow {
    code: String,
}

#[derive(Clone)]
pub struct SurrealChallengeCache<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealChallengeCache<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Delete every expired challenge.
    pub async fn purge_expired(&self) -> LatchkeyResult<()> {
        self.db
            .query("DELETE otp_challenge WHERE expires_at <= time::now()")
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        debug!("expired OTP challenges purged");
        Ok(())
    }
}

impl<C: Connection> ChallengeCache for SurrealChallengeCache<C> {
    async fn put(&self, email: &str, code: &str, ttl: Duration) -> LatchkeyResult<()> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| DbError::Query(format!("OTP ttl of {ttl:?} is out of range")))?;

        self.db
            .query(
                "UPSERT type::record('otp_challenge', $email) SET \
                 code = $code, expires_at = $expires_at",
            )
            .bind(("email", email.to_string()))
            .bind(("code", code.to_string()))
            .bind(("expires_at", expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::write(e, "otp_challenge", email))?;

        Ok(())
    }

    async fn get(&self, email: &str) -> LatchkeyResult<Option<String>> {
        let mut result = self
            .db
            .query(
                "SELECT code FROM type::record('otp_challenge', $email) \
                 WHERE expires_at > time::now()",
            )
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CodeRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|row| row.code))
    }

    async fn delete(&self, email: &str) -> LatchkeyResult<()> {
        self.db
            .query("DELETE type::record('otp_challenge', $email)")
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, email: &str) -> LatchkeyResult<bool> {
        Ok(self.get(email).await?.is_some())
    }
}
