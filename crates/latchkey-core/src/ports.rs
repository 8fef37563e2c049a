//! Non-storage collaborators: OTP delivery and credential handling.

use secrecy::SecretString;

use crate::error::LatchkeyResult;

/// Out-of-band OTP delivery (email, SMS, ...).
///
/// Called only after the write that produced the code has committed.
/// Errors are logged by the caller and never roll anything back.
pub trait Notifier: Send + Sync {
    fn send_otp(&self, email: &str, code: &str) -> impl Future<Output = LatchkeyResult<()>> + Send;
}

/// One-way credential encoding used at registration time.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &SecretString) -> LatchkeyResult<String>;
}

/// Verifies a presented password for an account.
///
/// Fails with [`LatchkeyError::AuthenticationFailed`](crate::error::LatchkeyError::AuthenticationFailed)
/// when the pair does not match.
pub trait CredentialVerifier: Send + Sync {
    fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> impl Future<Output = LatchkeyResult<()>> + Send;
}
