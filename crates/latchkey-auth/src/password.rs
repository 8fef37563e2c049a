//! Password hashing and verification using Argon2id.

use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use latchkey_core::error::{LatchkeyError, LatchkeyResult};
use latchkey_core::models::user::normalize_email;
use latchkey_core::ports::{CredentialHasher, CredentialVerifier};
use latchkey_core::repository::UserRepository;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::AuthError;

fn peppered<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buf = format!("{p}{password}");
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

/// Hash a plaintext password into an Argon2id PHC string.
///
/// If `pepper` is provided it is prepended to the password; the same
/// pepper must be supplied to [`verify_password`].
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(input, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Crypto(format!("hash error: {e}")))
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// [`CredentialHasher`] backed by Argon2id with default (OWASP) parameters.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    pepper: Option<String>,
}

impl Argon2Hasher {
    pub fn new(pepper: Option<String>) -> Self {
        Self { pepper }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &SecretString) -> LatchkeyResult<String> {
        Ok(hash_password(
            password.expose_secret(),
            self.pepper.as_deref(),
        )?)
    }
}

/// [`CredentialVerifier`] that checks the presented password against
/// the hash stored on the account.
///
/// An unknown email and a wrong password are indistinguishable to the
/// caller.
pub struct StoredCredentialVerifier<U: UserRepository> {
    users: Arc<U>,
    pepper: Option<String>,
}

impl<U: UserRepository> StoredCredentialVerifier<U> {
    pub fn new(users: Arc<U>, pepper: Option<String>) -> Self {
        Self { users, pepper }
    }
}

impl<U: UserRepository> CredentialVerifier for StoredCredentialVerifier<U> {
    async fn authenticate(&self, email: &str, password: &SecretString) -> LatchkeyResult<()> {
        let Some(user) = self.users.find_by_email(&normalize_email(email)).await? else {
            debug!("credential check for unknown account");
            return Err(AuthError::InvalidCredentials.into());
        };

        let valid = verify_password(
            password.expose_secret(),
            &user.password_hash,
            self.pepper.as_deref(),
        )
        .map_err(|e| LatchkeyError::Crypto(e.to_string()))?;

        if !valid {
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(())
    }
}
