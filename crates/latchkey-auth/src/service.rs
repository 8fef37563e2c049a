//! Authentication facade: composes registration, OTP, login and
//! refresh-token rotation into the flows a client drives.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use latchkey_core::error::{LatchkeyError, LatchkeyResult};
use latchkey_core::models::refresh_token::Device;
use latchkey_core::models::user::{CreateUser, User, UserRole, UserStatus, normalize_email};
use latchkey_core::ports::{CredentialHasher, Notifier};
use latchkey_core::repository::{ChallengeCache, RefreshTokenRepository, UserRepository};
use latchkey_core::validation::validate_user_for_creation;
use secrecy::SecretString;
use serde::Serialize;
use tracing::info;

use crate::challenge::{ChallengeService, OtpCommand};
use crate::config::AuthConfig;
use crate::dispatch::OtpDispatcher;
use crate::login::{LoginCommand, LoginOutcome, LoginService};
use crate::password::{Argon2Hasher, StoredCredentialVerifier};
use crate::random::SecureRandom;
use crate::registration::{RegisterCommand, RegisterOutcome, RegistrationService};
use crate::session::{RefreshSuccess, SessionRotationService};
use crate::token::TokenSigner;

/// An access-token outcome plus the refresh token minted alongside it.
///
/// `refresh` is `None` while an OTP is still pending.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    #[serde(flatten)]
    pub login: LoginOutcome,
    pub refresh: Option<RefreshSuccess>,
}

/// Authentication service.
///
/// Generic over store implementations so that the auth layer has no
/// dependency on the database crate.
pub struct AuthService<U, R, C, N>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    C: ChallengeCache,
    N: Notifier + 'static,
{
    users: Arc<U>,
    hasher: Arc<Argon2Hasher>,
    signer: Arc<TokenSigner>,
    dispatcher: Arc<OtpDispatcher<N>>,
    challenges: Arc<ChallengeService<U, C, N>>,
    registration: RegistrationService<U, C, Argon2Hasher, N>,
    login: LoginService<U, C, StoredCredentialVerifier<U>, N>,
    sessions: SessionRotationService<U, R>,
}

impl<U, R, C, N> AuthService<U, R, C, N>
where
    U: UserRepository,
    R: RefreshTokenRepository,
    C: ChallengeCache,
    N: Notifier + 'static,
{
    pub fn new(
        user_repo: U,
        token_repo: R,
        cache: C,
        notifier: N,
        random: SecureRandom,
        config: &AuthConfig,
    ) -> LatchkeyResult<Self> {
        let users = Arc::new(user_repo);
        let random = Arc::new(random);
        let signer = Arc::new(TokenSigner::new(config)?);
        let hasher = Arc::new(Argon2Hasher::new(config.pepper.clone()));
        let verifier = Arc::new(StoredCredentialVerifier::new(
            Arc::clone(&users),
            config.pepper.clone(),
        ));
        let dispatcher = Arc::new(OtpDispatcher::new(notifier));

        let challenges = Arc::new(ChallengeService::new(
            Arc::clone(&users),
            Arc::new(cache),
            Arc::clone(&dispatcher),
            Arc::clone(&random),
            Duration::from_secs(config.otp_ttl_secs),
        ));
        let registration = RegistrationService::new(
            Arc::clone(&users),
            Arc::clone(&hasher),
            Arc::clone(&challenges),
        );
        let login = LoginService::new(
            Arc::clone(&users),
            verifier,
            Arc::clone(&challenges),
            Arc::clone(&signer),
        );
        let sessions = SessionRotationService::new(
            Arc::clone(&users),
            Arc::new(token_repo),
            Arc::clone(&signer),
            random,
            config.refresh_token_lifetime_days,
        );

        Ok(Self {
            users,
            hasher,
            signer,
            dispatcher,
            challenges,
            registration,
            login,
            sessions,
        })
    }

    pub fn sessions(&self) -> &SessionRotationService<U, R> {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &OtpDispatcher<N> {
        &self.dispatcher
    }

    pub async fn register(&self, command: RegisterCommand) -> LatchkeyResult<RegisterOutcome> {
        self.registration.register(command).await
    }

    /// Log in and, when an access token was issued, mint a refresh
    /// token for `device`.
    pub async fn login(
        &self,
        command: &LoginCommand,
        device: &Device,
    ) -> LatchkeyResult<SessionGrant> {
        let login = self.login.login(command).await?;
        let refresh = if login.access_token.is_some() {
            Some(
                self.sessions
                    .create_refresh_token(&login.email, device)
                    .await?,
            )
        } else {
            None
        };
        Ok(SessionGrant { login, refresh })
    }

    /// Verify an OTP, activating the account, and start a session on
    /// `device`.
    pub async fn verify_otp(
        &self,
        command: &OtpCommand,
        device: &Device,
    ) -> LatchkeyResult<SessionGrant> {
        let user = self.challenges.verify(command).await?;
        let access_token = self.signer.issue(&user)?;
        let login = LoginOutcome::authenticated(&user, access_token);
        let refresh = self
            .sessions
            .create_refresh_token(&user.email, device)
            .await?;
        Ok(SessionGrant {
            login,
            refresh: Some(refresh),
        })
    }

    /// Exchange a live refresh token for a new access token and rotate
    /// the device's refresh token.
    pub async fn refresh(&self, token: &str, device: &Device) -> LatchkeyResult<SessionGrant> {
        let login = self.sessions.refresh(token).await?;
        let refresh = self
            .sessions
            .create_refresh_token(&login.email, device)
            .await?;
        Ok(SessionGrant {
            login,
            refresh: Some(refresh),
        })
    }

    pub async fn logout(&self, token: &str) -> LatchkeyResult<()> {
        self.sessions.logout(token).await
    }

    /// Create an ACTIVE admin account unless one already exists for
    /// `email`. Returns `None` when nothing was created.
    #[tracing::instrument(skip_all, fields(email = %email))]
    pub async fn seed_admin(
        &self,
        email: &str,
        password: &SecretString,
    ) -> LatchkeyResult<Option<User>> {
        let email = normalize_email(email);
        if self.users.exists_by_email(&email).await? {
            return Ok(None);
        }

        let mut admin = CreateUser {
            first_name: "Admin".into(),
            last_name: "User".into(),
            email,
            password_hash: String::new(),
            phone_number: None,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1)
                .ok_or_else(|| LatchkeyError::Internal("invalid seed date".into()))?,
            address: None,
            city: None,
            postal_code: None,
            role: UserRole::Admin,
            status: UserStatus::Active,
        };
        validate_user_for_creation(&admin, password)?;
        admin.password_hash = self.hasher.hash(password)?;

        let admin = self.users.create(admin).await?;
        info!(user_id = %admin.id, "admin account seeded");
        Ok(Some(admin))
    }
}
