//! Password login.

use std::sync::Arc;

use latchkey_core::error::{LatchkeyError, LatchkeyResult};
use latchkey_core::models::user::{User, UserStatus, normalize_email};
use latchkey_core::ports::{CredentialVerifier, Notifier};
use latchkey_core::repository::{ChallengeCache, UserRepository};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};

use crate::challenge::ChallengeService;
use crate::token::TokenSigner;

#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub email: String,
    pub password: SecretString,
}

/// Result of a login, OTP verification or refresh.
///
/// `access_token` is `None` exactly when `otp_pending` is true.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub otp_pending: bool,
    pub access_token: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl LoginOutcome {
    pub fn pending(user: &User) -> Self {
        Self {
            otp_pending: true,
            access_token: None,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }

    pub fn authenticated(user: &User, access_token: String) -> Self {
        Self {
            otp_pending: false,
            access_token: Some(access_token),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Authenticates credentials and branches on account status.
pub struct LoginService<U, C, V, N>
where
    U: UserRepository,
    C: ChallengeCache,
    V: CredentialVerifier,
    N: Notifier + 'static,
{
    users: Arc<U>,
    verifier: Arc<V>,
    challenges: Arc<ChallengeService<U, C, N>>,
    signer: Arc<TokenSigner>,
}

impl<U, C, V, N> LoginService<U, C, V, N>
where
    U: UserRepository,
    C: ChallengeCache,
    V: CredentialVerifier,
    N: Notifier + 'static,
{
    pub fn new(
        users: Arc<U>,
        verifier: Arc<V>,
        challenges: Arc<ChallengeService<U, C, N>>,
        signer: Arc<TokenSigner>,
    ) -> Self {
        Self {
            users,
            verifier,
            challenges,
            signer,
        }
    }

    /// Authenticate and issue an access token.
    ///
    /// PENDING accounts get their OTP challenge re-issued instead, and
    /// the password is not checked. SUSPENDED accounts are rejected
    /// before the password is checked.
    #[tracing::instrument(skip_all, fields(email = %command.email))]
    pub async fn login(&self, command: &LoginCommand) -> LatchkeyResult<LoginOutcome> {
        let email = normalize_email(&command.email);

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| LatchkeyError::UserNotFound {
                identifier: email.clone(),
            })?;

        match user.status {
            UserStatus::Pending => {
                self.challenges.issue_and_dispatch(&user).await?;
                info!(user_id = %user.id, "login deferred to OTP verification");
                return Ok(LoginOutcome::pending(&user));
            }
            UserStatus::Suspended => {
                warn!(user_id = %user.id, "login for suspended account");
                return Err(LatchkeyError::UserNotActive {
                    id: user.id,
                    status: user.status,
                });
            }
            UserStatus::Active => {}
        }

        self.verifier
            .authenticate(&email, &command.password)
            .await
            .inspect_err(|e| warn!(user_id = %user.id, error = %e, "login rejected"))?;

        let access_token = self.signer.issue(&user)?;
        info!(user_id = %user.id, "login succeeded");
        Ok(LoginOutcome::authenticated(&user, access_token))
    }
}
