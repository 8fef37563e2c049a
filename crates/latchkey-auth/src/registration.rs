//! Account registration.

use std::sync::Arc;

use chrono::NaiveDate;
use latchkey_core::error::{LatchkeyError, LatchkeyResult};
use latchkey_core::models::user::{
    CreateUser, UserRole, UserStatus, normalize_email, normalize_postal_code,
};
use latchkey_core::ports::{CredentialHasher, Notifier};
use latchkey_core::repository::{ChallengeCache, UserRepository};
use latchkey_core::validation::validate_user_for_creation;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};

use crate::challenge::ChallengeService;
use crate::dispatch::AfterCommit;

/// Input for the registration flow.
#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: SecretString,
    pub phone_number: Option<String>,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutcome {
    pub otp_pending: bool,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Creates PENDING accounts and starts their OTP challenge.
pub struct RegistrationService<U, C, H, N>
where
    U: UserRepository,
    C: ChallengeCache,
    H: CredentialHasher,
    N: Notifier + 'static,
{
    users: Arc<U>,
    hasher: Arc<H>,
    challenges: Arc<ChallengeService<U, C, N>>,
}

impl<U, C, H, N> RegistrationService<U, C, H, N>
where
    U: UserRepository,
    C: ChallengeCache,
    H: CredentialHasher,
    N: Notifier + 'static,
{
    pub fn new(users: Arc<U>, hasher: Arc<H>, challenges: Arc<ChallengeService<U, C, N>>) -> Self {
        Self {
            users,
            hasher,
            challenges,
        }
    }

    #[tracing::instrument(skip_all, fields(email = %command.email))]
    pub async fn register(&self, command: RegisterCommand) -> LatchkeyResult<RegisterOutcome> {
        let email = normalize_email(&command.email);

        let date_of_birth = NaiveDate::parse_from_str(command.date_of_birth.trim(), "%Y-%m-%d")
            .map_err(|_| {
                LatchkeyError::user_invalid(
                    "dateOfBirth",
                    command.date_of_birth.clone(),
                    "Date of birth must be formatted as YYYY-MM-DD",
                )
            })?;

        if self.users.exists_by_email(&email).await? {
            warn!("registration for existing email");
            return Err(LatchkeyError::UserAlreadyExists { email });
        }

        let mut candidate = CreateUser {
            first_name: command.first_name.trim().to_string(),
            last_name: command.last_name.trim().to_string(),
            email,
            password_hash: String::new(),
            phone_number: non_blank(command.phone_number),
            date_of_birth,
            address: non_blank(command.address),
            city: non_blank(command.city),
            postal_code: non_blank(command.postal_code).map(|p| normalize_postal_code(&p)),
            role: UserRole::User,
            status: UserStatus::Pending,
        };
        validate_user_for_creation(&candidate, &command.password)?;
        candidate.password_hash = self.hasher.hash(&command.password)?;

        // The challenge is staged first so that a failed insert can be
        // undone by withdrawing it; a failed `put` leaves no account.
        let mut after = AfterCommit::new();
        let email = candidate.email.clone();
        let staged = self.challenges.issue_for(&email, &mut after).await?;
        let user = match self.users.create(candidate).await {
            Ok(user) => user,
            Err(e) => {
                if staged {
                    self.challenges.withdraw(&email).await;
                }
                return Err(e);
            }
        };

        // committed
        self.challenges.dispatch(after);
        info!(user_id = %user.id, "account registered, awaiting OTP");

        Ok(RegisterOutcome {
            otp_pending: true,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
