//! Error types for the Latchkey system.
//!
//! Display strings are safe to log: they never carry refresh tokens,
//! OTP codes or passwords, even when the variant itself holds one for
//! the caller.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::user::UserStatus;

#[derive(Debug, Error)]
pub enum LatchkeyError {
    #[error("Invalid {field} '{value}': {reason}")]
    UserInvalid {
        field: String,
        value: String,
        reason: String,
    },

    #[error("User already exists with email: {email}")]
    UserAlreadyExists { email: String },

    #[error("User not found with identifier: {identifier}")]
    UserNotFound { identifier: String },

    #[error("User {id} is not active. Current status: {status}")]
    UserNotActive { id: Uuid, status: UserStatus },

    #[error("Invalid OTP format: {reason}")]
    OtpInvalidFormat { reason: String },

    #[error("OTP not found for email: {email}")]
    OtpNotFound { email: String },

    #[error("Invalid refresh token {field}: {reason}")]
    RefreshTokenInvalid { field: String, reason: String },

    #[error("Refresh token not found")]
    RefreshTokenNotFound { token: String },

    #[error("Refresh token expired at: {expiry}")]
    RefreshTokenExpired {
        token: String,
        expiry: DateTime<Utc>,
    },

    #[error("Refresh token has been revoked")]
    RefreshTokenRevoked { token: String },

    #[error("Invalid access token: {0}")]
    TokenInvalid(String),

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LatchkeyError {
    /// Shorthand for a [`LatchkeyError::UserInvalid`].
    pub fn user_invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UserInvalid {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`LatchkeyError::RefreshTokenInvalid`].
    pub fn refresh_token_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RefreshTokenInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable, machine-readable code for the failure kind.
    ///
    /// Boundaries (HTTP handlers, CLI exit paths) map on this value
    /// rather than on the formatted message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserInvalid { .. } => "USER_INVALID_DATA",
            Self::UserAlreadyExists { .. } => "USER_ALREADY_EXISTS",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::UserNotActive { .. } => "USER_NOT_ACTIVE",
            Self::OtpInvalidFormat { .. } => "OTP_INVALID_FORMAT",
            Self::OtpNotFound { .. } => "OTP_NOT_FOUND",
            Self::RefreshTokenInvalid { .. } => "REFRESH_INVALID_DATA",
            Self::RefreshTokenNotFound { .. } => "REFRESH_NOT_FOUND",
            Self::RefreshTokenExpired { .. } => "REFRESH_EXPIRED",
            Self::RefreshTokenRevoked { .. } => "REFRESH_REVOKED",
            Self::TokenInvalid(_) => "TOKEN_INVALID",
            Self::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Crypto(_) => "CRYPTO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type LatchkeyResult<T> = Result<T, LatchkeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_token_errors_do_not_leak_the_token() {
        let err = LatchkeyError::RefreshTokenRevoked {
            token: "secret-token-value".into(),
        };
        assert!(!err.to_string().contains("secret-token-value"));

        let err = LatchkeyError::RefreshTokenNotFound {
            token: "secret-token-value".into(),
        };
        assert!(!err.to_string().contains("secret-token-value"));
    }

    #[test]
    fn codes_distinguish_otp_and_user_failures() {
        let otp = LatchkeyError::OtpNotFound {
            email: "a@b.com".into(),
        };
        let user = LatchkeyError::UserNotFound {
            identifier: "a@b.com".into(),
        };
        assert_eq!(otp.code(), "OTP_NOT_FOUND");
        assert_eq!(user.code(), "USER_NOT_FOUND");
    }

    #[test]
    fn not_active_message_names_status() {
        let err = LatchkeyError::UserNotActive {
            id: Uuid::nil(),
            status: UserStatus::Suspended,
        };
        assert!(err.to_string().contains("SUSPENDED"));
    }
}
