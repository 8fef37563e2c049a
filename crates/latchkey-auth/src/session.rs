//! Refresh-token issuance, rotation, liveness and revocation.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::{DateTime, Duration, Utc};
use latchkey_core::error::{LatchkeyError, LatchkeyResult};
use latchkey_core::models::refresh_token::{Device, RefreshToken};
use latchkey_core::models::user::{UserStatus, normalize_email};
use latchkey_core::repository::{RefreshTokenRepository, UserRepository};
use latchkey_core::validation::{
    validate_refresh_token_for_creation, validate_refresh_token_for_revocation,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::login::LoginOutcome;
use crate::random::SecureRandom;
use crate::token::TokenSigner;

/// Random bytes per refresh token (88 base64url characters).
const REFRESH_TOKEN_BYTES: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSuccess {
    pub refresh_token: String,
    pub expiry_date: DateTime<Utc>,
}

/// Device-scoped refresh tokens with single-active-token rotation.
///
/// Creating a token for a (user, device) pair revokes the pair's
/// previous token and links it to the new one. Two concurrent creates
/// for the same pair can both succeed and leave two live tokens.
pub struct SessionRotationService<U: UserRepository, R: RefreshTokenRepository> {
    users: Arc<U>,
    tokens: Arc<R>,
    signer: Arc<TokenSigner>,
    random: Arc<SecureRandom>,
    lifetime_days: u32,
}

impl<U: UserRepository, R: RefreshTokenRepository> SessionRotationService<U, R> {
    pub fn new(
        users: Arc<U>,
        tokens: Arc<R>,
        signer: Arc<TokenSigner>,
        random: Arc<SecureRandom>,
        lifetime_days: u32,
    ) -> Self {
        Self {
            users,
            tokens,
            signer,
            random,
            lifetime_days,
        }
    }

    fn generate_token(&self) -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        self.random.fill_bytes(&mut bytes);
        URL_SAFE.encode(bytes)
    }

    /// Mint a refresh token for `email` on `device`, rotating out the
    /// device's current token if there is one.
    #[tracing::instrument(skip_all, fields(email = %email))]
    pub async fn create_refresh_token(
        &self,
        email: &str,
        device: &Device,
    ) -> LatchkeyResult<RefreshSuccess> {
        let token = self.generate_token();
        let email = normalize_email(email);

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| LatchkeyError::UserNotFound {
                identifier: email.clone(),
            })?;

        let now = Utc::now();
        let expiry_date = self.expiry_from(now)?;
        let candidate = RefreshToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token,
            expiry_date,
            revoked: false,
            device: device.clone(),
            created_at: now,
            replaced_by: None,
        };
        validate_refresh_token_for_creation(&candidate)?;

        let previous = self
            .tokens
            .find_active_by_user_and_device(user.id, device)
            .await?;

        let saved = match previous {
            Some(previous) => {
                let previous = mark_revoked(previous, Some(candidate.id))?;
                let saved = self.tokens.rotate(&previous, &candidate).await?;
                info!(user_id = %user.id, token_id = %saved.id, "refresh token rotated");
                saved
            }
            None => {
                let saved = self.tokens.save(&candidate).await?;
                info!(user_id = %user.id, token_id = %saved.id, "refresh token created");
                saved
            }
        };

        Ok(RefreshSuccess {
            refresh_token: saved.token,
            expiry_date: saved.expiry_date,
        })
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> LatchkeyResult<DateTime<Utc>> {
        Duration::try_days(i64::from(self.lifetime_days))
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                LatchkeyError::Internal(format!(
                    "refresh token lifetime of {} days is out of range",
                    self.lifetime_days
                ))
            })
    }

    pub async fn find_by_token(&self, token: &str) -> LatchkeyResult<RefreshToken> {
        self.tokens
            .find_by_token(token)
            .await?
            .ok_or_else(|| LatchkeyError::RefreshTokenNotFound {
                token: token.to_string(),
            })
    }

    /// Issue a new access token for the owner of a live refresh token.
    /// The refresh token itself is not rotated.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, token: &str) -> LatchkeyResult<LoginOutcome> {
        let stored = self.find_by_token(token).await?;
        self.verify_liveness(&stored)?;

        let user = self
            .users
            .find_by_id(stored.user_id)
            .await?
            .ok_or_else(|| LatchkeyError::UserNotFound {
                identifier: stored.user_id.to_string(),
            })?;
        if user.status == UserStatus::Suspended {
            warn!(user_id = %user.id, "refresh for suspended account");
            return Err(LatchkeyError::UserNotActive {
                id: user.id,
                status: user.status,
            });
        }

        let access_token = self.signer.issue(&user)?;
        info!(user_id = %user.id, token_id = %stored.id, "access token refreshed");
        Ok(LoginOutcome::authenticated(&user, access_token))
    }

    /// Mark `token` revoked, linking it to `successor` if given.
    ///
    /// A token that is already revoked is returned unchanged so its
    /// successor link is never overwritten.
    pub async fn revoke(
        &self,
        token: RefreshToken,
        successor: Option<Uuid>,
    ) -> LatchkeyResult<RefreshToken> {
        if token.revoked {
            debug!(token_id = %token.id, "refresh token already revoked");
            return Ok(token);
        }

        let token = mark_revoked(token, successor)?;
        let saved = self.tokens.save(&token).await?;
        debug!(token_id = %saved.id, replaced_by = ?saved.replaced_by, "refresh token revoked");
        Ok(saved)
    }

    /// Fails with `RefreshTokenExpired` if past expiry, then with
    /// `RefreshTokenRevoked` if revoked.
    pub fn verify_liveness(&self, token: &RefreshToken) -> LatchkeyResult<()> {
        if token.is_expired_at(Utc::now()) {
            warn!(token_id = %token.id, "expired refresh token presented");
            return Err(LatchkeyError::RefreshTokenExpired {
                token: token.token.clone(),
                expiry: token.expiry_date,
            });
        }
        if token.revoked {
            warn!(token_id = %token.id, "revoked refresh token presented");
            return Err(LatchkeyError::RefreshTokenRevoked {
                token: token.token.clone(),
            });
        }
        Ok(())
    }

    /// Revoke the presented token. Blank input is a no-op.
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self, token: &str) -> LatchkeyResult<()> {
        if token.trim().is_empty() {
            debug!("logout without a refresh token");
            return Ok(());
        }

        let stored = self.find_by_token(token).await?;
        let revoked = self.revoke(stored, None).await?;
        info!(user_id = %revoked.user_id, token_id = %revoked.id, "logged out");
        Ok(())
    }
}

fn mark_revoked(mut token: RefreshToken, successor: Option<Uuid>) -> LatchkeyResult<RefreshToken> {
    token.revoked = true;
    token.replaced_by = successor;
    validate_refresh_token_for_revocation(&token, successor.is_some())?;
    Ok(token)
}
