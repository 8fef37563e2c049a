//! Authentication error types.

use latchkey_core::error::LatchkeyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for LatchkeyError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => LatchkeyError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::TokenExpired | AuthError::TokenInvalid(_) => {
                LatchkeyError::TokenInvalid(err.to_string())
            }
            AuthError::Crypto(msg) => LatchkeyError::Crypto(msg),
        }
    }
}
