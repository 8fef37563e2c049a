//! SurrealDB implementation of [`RefreshTokenRepository`].

use chrono::{DateTime, Utc};
use latchkey_core::error::LatchkeyResult;
use latchkey_core::models::refresh_token::{Device, RefreshToken};
use latchkey_core::repository::RefreshTokenRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RefreshTokenRowWithId {
    record_id: String,
    user_id: String,
    token: String,
    expiry_date: DateTime<Utc>,
    revoked: bool,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    replaced_by: Option<String>,
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::decode("refresh_token", format!("invalid {what}: {e}")))
}

impl RefreshTokenRowWithId {
    fn try_into_token(self) -> Result<RefreshToken, DbError> {
        Ok(RefreshToken {
            id: parse_uuid(&self.record_id, "id")?,
            user_id: parse_uuid(&self.user_id, "user id")?,
            token: self.token,
            expiry_date: self.expiry_date,
            revoked: self.revoked,
            device: Device {
                ip_address: self.ip_address,
                user_agent: self.user_agent,
            },
            created_at: self.created_at,
            replaced_by: self
                .replaced_by
                .as_deref()
                .map(|s| parse_uuid(s, "successor id"))
                .transpose()?,
        })
    }
}

const UPSERT_TOKEN: &str = "UPSERT type::record('refresh_token', $id) SET \
     user_id = $user_id, token = $token_value, \
     expiry_date = $expiry_date, revoked = $revoked, \
     ip_address = $ip_address, user_agent = $user_agent, \
     created_at = $created_at, replaced_by = $replaced_by";

const REVOKE_PREVIOUS: &str = "UPDATE type::record('refresh_token', $previous_id) SET \
     revoked = $previous_revoked, replaced_by = $previous_replaced_by";

/// SurrealDB implementation of the RefreshToken repository.
///
/// Tokens are keyed by their UUID; the successor link is stored as the
/// successor's id string.
#[derive(Clone)]
pub struct SurrealRefreshTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Upsert `token`. With `previous`, the previous token's revocation
    /// is written in the same transaction.
    async fn write(
        &self,
        token: &RefreshToken,
        previous: Option<&RefreshToken>,
    ) -> LatchkeyResult<RefreshToken> {
        let id_str = token.id.to_string();
        let sql = match previous {
            None => UPSERT_TOKEN.to_string(),
            Some(_) => format!(
                "BEGIN TRANSACTION; {UPSERT_TOKEN}; {REVOKE_PREVIOUS}; COMMIT TRANSACTION;"
            ),
        };

        let mut query = self
            .db
            .query(sql)
            .bind(("id", id_str.clone()))
            .bind(("user_id", token.user_id.to_string()))
            .bind(("token_value", token.token.clone()))
            .bind(("expiry_date", token.expiry_date))
            .bind(("revoked", token.revoked))
            .bind(("ip_address", token.device.ip_address.clone()))
            .bind(("user_agent", token.device.user_agent.clone()))
            .bind(("created_at", token.created_at))
            .bind(("replaced_by", token.replaced_by.map(|id| id.to_string())));
        if let Some(previous) = previous {
            query = query
                .bind(("previous_id", previous.id.to_string()))
                .bind(("previous_revoked", previous.revoked))
                .bind((
                    "previous_replaced_by",
                    previous.replaced_by.map(|id| id.to_string()),
                ));
        }

        let result = query.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::write(e, "refresh_token", &id_str))?;

        Ok(token.clone())
    }

    async fn select_one(
        &self,
        query: &'static str,
        binds: Vec<(&'static str, Option<String>)>,
    ) -> LatchkeyResult<Option<RefreshToken>> {
        let mut builder = self.db.query(query);
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_token()?)),
            None => Ok(None),
        }
    }
}

impl<C: Connection> RefreshTokenRepository for SurrealRefreshTokenRepository<C> {
    async fn save(&self, token: &RefreshToken) -> LatchkeyResult<RefreshToken> {
        self.write(token, None).await
    }

    async fn rotate(
        &self,
        previous: &RefreshToken,
        successor: &RefreshToken,
    ) -> LatchkeyResult<RefreshToken> {
        self.write(successor, Some(previous)).await
    }

    async fn find_by_token(&self, token: &str) -> LatchkeyResult<Option<RefreshToken>> {
        self.select_one(
            "SELECT meta::id(id) AS record_id, * FROM refresh_token \
             WHERE token = $token_value",
            vec![("token_value", Some(token.to_string()))],
        )
        .await
    }

    async fn find_active_by_user_and_device(
        &self,
        user_id: Uuid,
        device: &Device,
    ) -> LatchkeyResult<Option<RefreshToken>> {
        self.select_one(
            "SELECT meta::id(id) AS record_id, * FROM refresh_token \
             WHERE user_id = $user_id \
             AND ip_address = $ip_address \
             AND user_agent = $user_agent \
             AND revoked = false \
             ORDER BY created_at DESC LIMIT 1",
            vec![
                ("user_id", Some(user_id.to_string())),
                ("ip_address", device.ip_address.clone()),
                ("user_agent", device.user_agent.clone()),
            ],
        )
        .await
    }
}
