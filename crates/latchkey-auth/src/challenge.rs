//! OTP challenge issuance and verification.

use std::sync::Arc;
use std::time::Duration;

use latchkey_core::error::{LatchkeyError, LatchkeyResult};
use latchkey_core::models::user::{User, UserStatus, normalize_email};
use latchkey_core::ports::Notifier;
use latchkey_core::repository::{ChallengeCache, UserRepository};
use latchkey_core::validation::{validate_otp_format, validate_user_for_update};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::dispatch::{AfterCommit, OtpDispatcher};
use crate::random::SecureRandom;

/// Input for OTP verification.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpCommand {
    pub email: String,
    pub code: String,
}

/// Issues, resend-suppresses and verifies OTP codes.
///
/// At most one live code exists per email. A code is consumed on the
/// first successful verification.
pub struct ChallengeService<U, C, N>
where
    U: UserRepository,
    C: ChallengeCache,
    N: Notifier + 'static,
{
    users: Arc<U>,
    cache: Arc<C>,
    dispatcher: Arc<OtpDispatcher<N>>,
    random: Arc<SecureRandom>,
    ttl: Duration,
}

impl<U, C, N> ChallengeService<U, C, N>
where
    U: UserRepository,
    C: ChallengeCache,
    N: Notifier + 'static,
{
    pub fn new(
        users: Arc<U>,
        cache: Arc<C>,
        dispatcher: Arc<OtpDispatcher<N>>,
        random: Arc<SecureRandom>,
        ttl: Duration,
    ) -> Self {
        Self {
            users,
            cache,
            dispatcher,
            random,
            ttl,
        }
    }

    /// Store a fresh code for `user` and queue its delivery on `after`.
    ///
    /// Does nothing if a live code already exists for the email.
    pub async fn issue(&self, user: &User, after: &mut AfterCommit) -> LatchkeyResult<()> {
        self.issue_for(&user.email, after).await.map(|_| ())
    }

    /// [`issue`](Self::issue) keyed by email alone, for callers that
    /// stage the challenge before the account row exists. Returns
    /// whether a new code was stored.
    #[tracing::instrument(skip_all, fields(email = %email))]
    pub async fn issue_for(&self, email: &str, after: &mut AfterCommit) -> LatchkeyResult<bool> {
        if self.cache.exists(email).await? {
            debug!("live OTP already exists, not reissuing");
            return Ok(false);
        }

        let code = self.random.otp_code();
        self.cache.put(email, &code, self.ttl).await?;
        after.queue_otp(email.to_string(), code);

        info!(ttl_secs = self.ttl.as_secs(), "OTP issued");
        Ok(true)
    }

    /// Remove a challenge staged by a boundary that failed afterwards.
    /// Failures are logged; the entry then lapses with its TTL.
    pub async fn withdraw(&self, email: &str) {
        if let Err(e) = self.cache.delete(email).await {
            error!(%email, error = %e, "failed to withdraw staged OTP");
        }
    }

    /// [`issue`](Self::issue) as its own commit boundary.
    pub async fn issue_and_dispatch(&self, user: &User) -> LatchkeyResult<()> {
        let mut after = AfterCommit::new();
        self.issue(user, &mut after).await?;
        self.dispatch(after);
        Ok(())
    }

    /// Hand a committed boundary's deliveries to the dispatcher.
    pub fn dispatch(&self, after: AfterCommit) {
        self.dispatcher.dispatch(after);
    }

    /// Check `code` against the live challenge for `email` and
    /// activate the account on a match.
    ///
    /// A wrong code is reported as [`LatchkeyError::OtpNotFound`], the
    /// same as a missing or expired one.
    #[tracing::instrument(skip_all, fields(email = %command.email))]
    pub async fn verify(&self, command: &OtpCommand) -> LatchkeyResult<User> {
        validate_otp_format(&command.code)?;
        let email = normalize_email(&command.email);

        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| LatchkeyError::UserNotFound {
                identifier: email.clone(),
            })?;

        let Some(stored) = self.cache.get(&email).await? else {
            warn!("no live OTP for account");
            return Err(LatchkeyError::OtpNotFound { email });
        };

        let matches: bool = stored.as_bytes().ct_eq(command.code.as_bytes()).into();
        if !matches {
            warn!("OTP mismatch");
            return Err(LatchkeyError::OtpNotFound { email });
        }

        let pending = user.clone();
        user.status = UserStatus::Active;
        validate_user_for_update(&user, None)?;
        let user = self.users.save(&user).await?;

        // Consume the code; on failure put the account back so the
        // boundary leaves nothing behind.
        if let Err(e) = self.cache.delete(&email).await {
            warn!(error = %e, "could not consume OTP, reverting activation");
            if let Err(revert) = self.users.save(&pending).await {
                error!(user_id = %pending.id, error = %revert, "failed to revert activation");
            }
            return Err(e);
        }

        info!(user_id = %user.id, "account activated");
        Ok(user)
    }
}
